//! Starvation Demo
//!
//! Shows the readers-preference limitation of the lock: a continuous stream
//! of arriving readers keeps the read section occupied, and a writer queued
//! behind them waits until the stream dries up. The writer's wait is measured
//! and reported; nothing prevents it from growing with the stream.
//!
//! # Usage
//! ```bash
//! cargo run --bin starvation-demo
//! cargo run --bin starvation-demo -- --stream-len 50 --arrival-ms 10 --hold-ms 40
//! ```

use std::time::Instant;

use clap::Parser;
use demos::logging::init_tracing;
use rwgate_core::arbitration::init_shared_counter;
use tokio::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "starvation-demo")]
#[command(about = "Observes writer starvation under a sustained reader stream")]
struct Args {
    /// Number of readers in the stream
    #[arg(long, default_value_t = 30)]
    stream_len: u32,

    /// Delay between reader arrivals
    #[arg(long, default_value_t = 10)]
    arrival_ms: u64,

    /// How long each reader stays inside the read section
    #[arg(long, default_value_t = 40)]
    hold_ms: u64,
}

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing("starvation-demo");

    let (access, _) = init_shared_counter(0);
    let lock = access.lock();

    info!(
        "Reader stream: {} readers, one every {}ms, each holding {}ms",
        args.stream_len, args.arrival_ms, args.hold_ms
    );

    // The writer queues up right after the stream starts
    let writer_lock = lock.clone();
    let arrival = args.arrival_ms;
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2 * arrival)).await;
        info!("Writer 0 waiting for exclusive access...");
        let queued_at = Instant::now();
        writer_lock.write(0, |v| *v += 1).await;
        let waited = queued_at.elapsed();
        info!("Writer 0 acquired exclusive access after {:?}", waited);
        waited
    });

    let mut readers = Vec::new();
    for reader_id in 0..args.stream_len {
        let reader_lock = lock.clone();
        let hold = Duration::from_millis(args.hold_ms);
        readers.push(tokio::spawn(async move {
            reader_lock.read_for(reader_id, hold).await;
        }));
        tokio::time::sleep(Duration::from_millis(args.arrival_ms)).await;
    }
    for reader in readers {
        let _ = reader.await;
    }

    match writer.await {
        Ok(waited) => info!(
            "Readers-preference in action: the writer waited {:?} while {} readers streamed by",
            waited, args.stream_len
        ),
        Err(e) => tracing::error!("writer task failed: {e}"),
    }

    info!("Final data: {}", lock.read(0).await);
}
