//! Reader-writer demos - shared utilities
//!
//! Common pieces for the demonstration binaries: structured logging setup and
//! the reader/writer workload loops.

pub mod logging;
pub mod workload;
