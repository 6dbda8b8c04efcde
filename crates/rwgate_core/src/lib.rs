//! Core reader-writer arbitration library.
//!
//! Provides [`arbitration::rwlock::ReaderWriterLock`], a readers-preference
//! reader-writer lock composed from two `tokio::sync::Mutex` instances, along
//! with section instrumentation and a `tower::Service` facade over a shared
//! counter.

pub mod arbitration;

/// Tracing initialization for debugging and development.
///
/// Enabled with the `rwgate_tracing` feature, initialized once per process
/// (typically at the top of a test or demo run).
#[cfg(feature = "rwgate_tracing")]
pub mod rwgate_tracing {
    use std::sync::Once;

    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    static INIT: Once = Once::new();

    /// Initialize the tracing subscriber.
    ///
    /// Filter from `RUST_LOG`, defaulting to `rwgate_core=debug`.
    pub fn init() {
        INIT.call_once(|| {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rwgate_core=debug"));

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_target(true))
                .init();
        });
    }
}
