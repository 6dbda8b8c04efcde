//! Reader and writer workload loops shared by the demo binaries.
use rand::Rng;
use rwgate_core::arbitration::{CallerId, rwlock::ReaderWriterLock};
use tokio::time::Duration;
use tracing::info;

/// Uniform jitter in milliseconds, standing in for real I/O or computation.
///
/// An upper bound below the lower bound is treated as equal to it, so
/// inverted CLI delay flags degrade to a fixed delay instead of panicking.
pub fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    let upper = max_ms.max(min_ms);
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=upper))
}

/// Reader loop: observe the shared counter `iterations` times, holding the
/// read section for a jittered duration each time, then pausing between
/// iterations.
pub async fn reader_loop(
    lock: ReaderWriterLock<u64>,
    reader_id: CallerId,
    iterations: u32,
    min_delay_ms: u64,
    max_delay_ms: u64,
) {
    for _ in 0..iterations {
        let hold = jitter(min_delay_ms, max_delay_ms);
        let value = lock.read_for(reader_id, hold).await;
        info!("Reader {} reads data: {}", reader_id, value);
        tokio::time::sleep(jitter(min_delay_ms, max_delay_ms)).await;
    }
}

/// Writer loop: increment the shared counter `iterations` times, holding the
/// write section for a jittered duration each time, then pausing between
/// iterations.
pub async fn writer_loop(
    lock: ReaderWriterLock<u64>,
    writer_id: CallerId,
    iterations: u32,
    min_delay_ms: u64,
    max_delay_ms: u64,
) {
    for _ in 0..iterations {
        let hold = jitter(min_delay_ms, max_delay_ms);
        info!("Writer {} is writing...", writer_id);
        let value = lock
            .write_for(writer_id, hold, |v| {
                *v += 1;
                *v
            })
            .await;
        info!("Writer {} finished writing. New data: {}", writer_id, value);
        tokio::time::sleep(jitter(min_delay_ms, max_delay_ms)).await;
    }
}
