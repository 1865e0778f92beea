//! Retry logic.
//!
//! # Responsibilities
//! - Classify outcomes as transient or terminal
//! - Replay the request with a fresh body on each attempt
//! - Pace retries with `Retry-After` or capped exponential backoff
//! - Report exhaustion as its own error, distinct from the last response
//!
//! # Design Decisions
//! - A single-use body disables retries for the whole call
//! - Transport errors, 429 and 5xx are retryable; everything else is
//!   returned untouched
//! - `Retry-After` (integer seconds) replaces the backoff for one wait and
//!   does not advance the exponential sequence
//! - Every wait, and the dispatch itself, races the caller's cancellation
//!   token
//! - Draining a retried body is bounded by the attempt timeout

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header::RETRY_AFTER, request::Parts, HeaderMap, Request, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service, ServiceExt};

use crate::config::RetrySettings;
use crate::error::Error;
use crate::http::body::{cancellation_of, AttemptBody, RequestBody};
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;

/// Upper bound on bytes read when draining a retried response.
const DRAIN_LIMIT: usize = 64 * 1024;

/// Decide whether an outcome should be retried.
///
/// Transport failures are always retryable; responses only for 429 and
/// 500–599. Cancellation, body replay and limiter shutdown are terminal.
pub fn is_retryable(outcome: &Result<Response<Body>, Error>) -> bool {
    match outcome {
        Ok(response) => is_retryable_status(response.status()),
        Err(Error::Transport(_)) => true,
        Err(_) => false,
    }
}

/// True for 429 Too Many Requests and every 5xx status.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Parse `Retry-After` as a positive whole number of seconds.
///
/// Fractional, negative, zero and HTTP-date values are treated as absent.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match value.parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
    }
}

/// Applies retry handling around a rate-limited transport.
#[derive(Clone, Debug)]
pub struct RetryLayer {
    settings: RetrySettings,
}

impl RetryLayer {
    pub fn new(settings: RetrySettings) -> Self {
        Self { settings }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry {
            inner,
            settings: self.settings,
        }
    }
}

/// Service that owns the attempt loop for one logical call.
#[derive(Clone, Debug)]
pub struct Retry<S> {
    inner: S,
    settings: RetrySettings,
}

impl<S> Service<Request<RequestBody>> for Retry<S>
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Error> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<RequestBody>) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(execute(inner, self.settings, req))
    }
}

async fn execute<S>(
    inner: S,
    settings: RetrySettings,
    req: Request<RequestBody>,
) -> Result<Response<Body>, Error>
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Error> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    let (parts, body) = req.into_parts();
    let cancel = cancellation_of(&parts.extensions);

    if !body.is_replayable() {
        tracing::debug!(
            method = %parts.method,
            uri = %parts.uri,
            "Request body is not replayable; retries disabled"
        );
        let mut body = AttemptBody::from(body);
        let req = attempt_request(&parts, body.next()?);
        let outcome = dispatch(inner, req, &cancel).await;
        metrics::record_attempt(&outcome);
        return outcome;
    }

    let max_attempts = settings.max_attempts();
    let mut body = AttemptBody::from(body);
    let mut backoff = Backoff::new(settings.initial_backoff, settings.max_backoff);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let req = attempt_request(&parts, body.next()?);
        let outcome = dispatch(inner.clone(), req, &cancel).await;
        let status = outcome.as_ref().ok().map(|r| r.status());
        metrics::record_attempt(&outcome);

        if !is_retryable(&outcome) {
            return outcome;
        }

        if attempt >= max_attempts {
            if let Ok(response) = outcome {
                drop(response.into_body());
            }
            tracing::warn!(
                method = %parts.method,
                uri = %parts.uri,
                attempts = attempt,
                last_status = ?status,
                "Giving up after max retry attempts"
            );
            metrics::record_exhausted();
            return Err(Error::RetriesExhausted {
                attempts: attempt,
                last_status: status,
            });
        }

        let retry_after = match outcome {
            Ok(response) => {
                let retry_after = parse_retry_after(response.headers());
                drain(response.into_body(), settings.timeout, &cancel).await?;
                retry_after
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "Transport error, will retry");
                None
            }
        };

        let delay = match retry_after {
            Some(delay) => delay,
            None => backoff.next_delay(),
        };
        metrics::record_retry(retry_after.is_some());
        tracing::info!(
            method = %parts.method,
            uri = %parts.uri,
            attempt,
            delay = ?delay,
            status = ?status,
            retry_after = retry_after.is_some(),
            "Retrying request"
        );

        sleep(delay, &cancel).await?;
    }
}

/// Dispatch one attempt, racing the caller's cancellation token.
async fn dispatch<S>(
    inner: S,
    req: Request<Body>,
    cancel: &CancellationToken,
) -> Result<Response<Body>, Error>
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Error>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        outcome = inner.oneshot(req) => outcome,
    }
}

/// Pause between attempts; returns `Cancelled` if the token fires first.
async fn sleep(delay: Duration, cancel: &CancellationToken) -> Result<(), Error> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!("Cancelled during retry backoff");
            Err(Error::Cancelled)
        }
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Read (and discard) what is left of a response so the connection can be
/// reused. Bodies larger than `DRAIN_LIMIT`, or still streaming after
/// `deadline`, are dropped instead.
async fn drain(body: Body, deadline: Duration, cancel: &CancellationToken) -> Result<(), Error> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        drained = tokio::time::timeout(deadline, axum::body::to_bytes(body, DRAIN_LIMIT)) => {
            match drained {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::trace!(error = %e, "Response body not fully drained"),
                Err(_) => tracing::debug!(deadline = ?deadline, "Response body stalled, dropping connection"),
            }
            Ok(())
        }
    }
}

fn attempt_request(parts: &Parts, body: Body) -> Request<Body> {
    let mut req = Request::new(body);
    *req.method_mut() = parts.method.clone();
    *req.uri_mut() = parts.uri.clone();
    *req.version_mut() = parts.version;
    *req.headers_mut() = parts.headers.clone();
    *req.extensions_mut() = parts.extensions.clone();
    req
}
