//! Readers-Writers Demo
//!
//! Spawns N reader tasks and M writer tasks over a single shared counter
//! protected by the reader-writer lock. Readers observe the counter
//! concurrently; writers get exclusive access and increment it. The run ends
//! with a summary comparing the final counter against the expected number of
//! increments, plus the concurrency the probe observed.
//!
//! # Usage
//! ```bash
//! cargo run --bin readers-writers-demo
//! cargo run --bin readers-writers-demo -- --readers 5 --writers 3 --min-delay-ms 50 --max-delay-ms 100
//! ```

use clap::Parser;
use demos::{
    logging::init_tracing,
    workload::{reader_loop, writer_loop},
};
use futures::future::join_all;
use rwgate_core::arbitration::{init_shared_counter, probe::Section};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "readers-writers-demo")]
#[command(about = "Concurrent readers and exclusive writers over a shared counter")]
struct Args {
    /// Number of reader tasks
    #[arg(long, default_value_t = 3)]
    readers: u32,

    /// Number of writer tasks
    #[arg(long, default_value_t = 2)]
    writers: u32,

    /// Read operations per reader
    #[arg(long, default_value_t = 5)]
    reader_iterations: u32,

    /// Write operations per writer
    #[arg(long, default_value_t = 3)]
    writer_iterations: u32,

    /// Lower bound of the simulated work duration
    #[arg(long, default_value_t = 500)]
    min_delay_ms: u64,

    /// Upper bound of the simulated work duration
    #[arg(long, default_value_t = 1000)]
    max_delay_ms: u64,
}

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing("readers-writers-demo");

    let (access, probe) = init_shared_counter(0);
    let lock = access.lock();

    let mut tasks = Vec::new();
    for reader_id in 0..args.readers {
        tasks.push(tokio::spawn(reader_loop(
            lock.clone(),
            reader_id,
            args.reader_iterations,
            args.min_delay_ms,
            args.max_delay_ms,
        )));
    }
    for writer_id in 0..args.writers {
        tasks.push(tokio::spawn(writer_loop(
            lock.clone(),
            writer_id,
            args.writer_iterations,
            args.min_delay_ms,
            args.max_delay_ms,
        )));
    }

    for result in join_all(tasks).await {
        if let Err(e) = result {
            tracing::error!("workload task failed: {e}");
        }
    }

    let expected = u64::from(args.writers) * u64::from(args.writer_iterations);
    let final_value = lock.read(0).await;
    info!("All reader/writer tasks completed.");
    info!("Final data: {} (expected {})", final_value, expected);
    info!(
        "Peak concurrent readers observed: {}",
        probe.max_concurrent(Section::Read)
    );
    info!(
        "Read/write section overlaps observed: {}",
        probe.overlap_count(Section::Read, Section::Write)
    );
}
