//! Rate-limited, retrying HTTP client.
//!
//! ```text
//! Caller → RetryClient → Retry → RateLimit → base transport (hyper-util)
//! ```
//!
//! - `RateLimit` admits at most `max_rps` attempts per second (token bucket)
//! - `Retry` retries transport errors, 429 and 5xx with `Retry-After` or
//!   capped exponential backoff, and only when the body can be replayed
//! - Every wait honours the `CancellationToken` attached to the request

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod resilience;

pub use client::RetryClient;
pub use config::{ClientConfig, RetrySettings};
pub use error::Error;
pub use http::{BodyFactory, RequestBody, RequestExt};
pub use resilience::{RateLimiter, RetryLayer, RateLimitLayer};
pub use tokio_util::sync::CancellationToken;
