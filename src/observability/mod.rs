//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! rate limiter / retry layer:
//!     → tracing events (attempt, delay, status, error fields)
//!     → metrics.rs (counters, histograms via the `metrics` facade)
//!
//! Binaries:
//!     → logging.rs (fmt subscriber + env filter)
//! ```

pub mod logging;
pub mod metrics;
