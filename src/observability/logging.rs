//! Structured logging setup for binaries.
//!
//! The library only emits `tracing` events; applications decide where they
//! go. `init_logging` is what the bundled CLI uses.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "retry_client=info";

/// Install a global fmt subscriber filtered by `RUST_LOG` or `default_filter`.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
}
