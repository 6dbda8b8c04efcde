//! Structured logging setup for the demo binaries.
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Initialize tracing for a demo run.
///
/// Env filter from `RUST_LOG`, defaulting to `demos=info,rwgate_core=info`,
/// with colored compact output.
pub fn init_tracing(demo: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("demos=info,rwgate_core=info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(true).compact().with_target(false))
            .init();

        tracing::info!(demo = %demo, "=== Demo initialized ===");
    });
}
