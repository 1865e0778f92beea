//! Error type shared by every stage of the client pipeline.

use axum::http::StatusCode;
use tower::BoxError;

/// Errors surfaced by [`RetryClient`](crate::RetryClient) and its layers.
///
/// Non-retryable responses (2xx, 3xx, 4xx other than 429) are never turned
/// into errors; they come back as ordinary responses.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request's cancellation token fired while queued for a token,
    /// dispatching, or waiting between attempts.
    #[error("request cancelled")]
    Cancelled,

    /// The replayable body factory failed to produce a fresh body.
    #[error("failed to re-acquire request body: {0}")]
    BodyReplay(#[source] BoxError),

    /// The base transport failed without producing a response.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The attempt budget ran out while the outcome was still transient.
    #[error("max retry attempts reached after {attempts} attempts{}", last_status_suffix(.last_status))]
    RetriesExhausted {
        /// Total dispatches performed (initial attempt included).
        attempts: u32,
        /// Status of the final response, `None` if it was a transport error.
        last_status: Option<StatusCode>,
    },

    /// The rate limiter was shut down.
    #[error("rate limiter closed")]
    LimiterClosed,
}

impl Error {
    /// Wrap any transport-level failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Error::Transport(err.into())
    }

    /// True for [`Error::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// True for [`Error::RetriesExhausted`].
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Error::RetriesExhausted { .. })
    }
}

fn last_status_suffix(status: &Option<StatusCode>) -> String {
    match status {
        Some(status) => format!(" (last status {})", status),
        None => String::new(),
    }
}
