//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request<RequestBody> from the caller:
//!     → retries.rs (attempt loop, classification, Retry-After / backoff.rs)
//!     → rate_limit.rs (wait for a token, cancellable)
//!     → base transport
//! ```
//!
//! # Design Decisions
//! - Both stages are tower layers; the retry layer wraps the limiter so
//!   every attempt, not every call, consumes a token
//! - Per-call retry state is never shared; the token bucket is the only
//!   shared mutable state
//! - All waits honour the request's cancellation token

pub mod backoff;
pub mod rate_limit;
pub mod retries;

pub use backoff::Backoff;
pub use rate_limit::{RateLimit, RateLimitLayer, RateLimiter};
pub use retries::{is_retryable, is_retryable_status, parse_retry_after, Retry, RetryLayer};
