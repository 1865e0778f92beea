//! Metrics recorded by the client layers.
//!
//! # Metrics
//! - `retry_client_attempts_total` (counter): dispatches by outcome
//!   (`success`, `terminal`, `rate_limited`, `server_error`,
//!   `transport_error`, `cancelled`, `closed`)
//! - `retry_client_retries_total` (counter): retries scheduled, by reason
//! - `retry_client_exhausted_total` (counter): calls that gave up
//! - `retry_client_rate_limit_wait_seconds` (histogram): time queued for a token
//!
//! Only the `metrics` facade is used; installing an exporter is up to the
//! application.

use std::time::Duration;

use axum::body::Body;
use axum::http::Response;

use crate::error::Error;

/// Outcome label for one dispatch.
pub fn outcome_label(outcome: &Result<Response<Body>, Error>) -> &'static str {
    match outcome {
        Ok(response) => match response.status().as_u16() {
            429 => "rate_limited",
            500..=599 => "server_error",
            200..=299 => "success",
            _ => "terminal",
        },
        Err(Error::Transport(_)) => "transport_error",
        Err(Error::Cancelled) => "cancelled",
        Err(Error::LimiterClosed) => "closed",
        Err(Error::BodyReplay(_)) => "body_replay",
        Err(Error::RetriesExhausted { .. }) => "exhausted",
    }
}

/// Record one dispatch and its outcome.
pub fn record_attempt(outcome: &Result<Response<Body>, Error>) {
    metrics::counter!("retry_client_attempts_total", "outcome" => outcome_label(outcome))
        .increment(1);
}

/// Record a scheduled retry.
pub fn record_retry(retry_after: bool) {
    let reason = if retry_after { "retry_after" } else { "backoff" };
    metrics::counter!("retry_client_retries_total", "reason" => reason).increment(1);
}

/// Record a call that exhausted its attempt budget.
pub fn record_exhausted() {
    metrics::counter!("retry_client_exhausted_total").increment(1);
}

/// Record time spent waiting for a rate limiter token.
pub fn record_rate_limit_wait(waited: Duration) {
    metrics::histogram!("retry_client_rate_limit_wait_seconds").record(waited.as_secs_f64());
}
