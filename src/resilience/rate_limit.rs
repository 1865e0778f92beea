//! Token bucket rate limiter and the tower layer that applies it.
//!
//! # Responsibilities
//! - Admit at most `max_rps` dispatches per second over the long run
//! - Refill one token every `1s / max_rps` from a background task
//! - Let callers abort the wait through their cancellation token
//!
//! # Design Decisions
//! - The bucket is a `Semaphore` whose permits are the tokens; consumers
//!   `forget` the permit they take, the refill task adds permits back
//! - Deposits into a full bucket are dropped, so burst never exceeds
//!   `max_rps`
//! - The bucket starts empty and is created lazily, exactly once, on the
//!   first `acquire`
//! - The refill task stops on `shutdown()` or when the last handle drops

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use tokio::sync::Semaphore;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower::{BoxError, Layer, Service, ServiceExt};

use crate::error::Error;
use crate::http::body::cancellation_of;
use crate::observability::metrics;

/// Shared token bucket limiter. Cheap to clone; clones share the bucket.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    max_rps: u32,
    bucket: OnceLock<Bucket>,
    stop: CancellationToken,
}

struct Bucket {
    tokens: Arc<Semaphore>,
    _refill: DropGuard,
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("available", &self.tokens.available_permits())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter admitting `max_rps` calls per second; 0 disables it.
    pub fn new(max_rps: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_rps,
                bucket: OnceLock::new(),
                stop: CancellationToken::new(),
            }),
        }
    }

    /// A limiter that admits everything immediately.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Configured rate.
    pub fn max_rps(&self) -> u32 {
        self.inner.max_rps
    }

    /// False when the limiter passes calls through untouched.
    pub fn is_enabled(&self) -> bool {
        self.inner.max_rps > 0
    }

    /// Interval between token deposits.
    pub fn refill_interval(&self) -> Option<Duration> {
        if self.is_enabled() {
            Some(refill_period(self.inner.max_rps))
        } else {
            None
        }
    }

    /// Tokens currently waiting in the bucket.
    pub fn available(&self) -> usize {
        self.inner
            .bucket
            .get()
            .map(|bucket| bucket.tokens.available_permits())
            .unwrap_or(0)
    }

    /// Wait for a token or for `cancel` to fire.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Error> {
        if !self.is_enabled() {
            return Ok(());
        }

        let bucket = self.bucket();
        if self.inner.stop.is_cancelled() {
            return Err(Error::LimiterClosed);
        }

        let started = Instant::now();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Cancelled while waiting for rate limit token");
                Err(Error::Cancelled)
            }
            permit = bucket.tokens.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    let waited = started.elapsed();
                    metrics::record_rate_limit_wait(waited);
                    tracing::trace!(waited = ?waited, "Rate limit token acquired");
                    Ok(())
                }
                Err(_) => Err(Error::LimiterClosed),
            },
        }
    }

    /// Stop the refill task and wake every waiter with `LimiterClosed`.
    pub fn shutdown(&self) {
        self.inner.stop.cancel();
        if let Some(bucket) = self.inner.bucket.get() {
            bucket.tokens.close();
        }
    }

    fn bucket(&self) -> &Bucket {
        self.inner.bucket.get_or_init(|| {
            let capacity = self.inner.max_rps as usize;
            let period = refill_period(self.inner.max_rps);
            let tokens = Arc::new(Semaphore::new(0));
            let stop = self.inner.stop.child_token();

            tracing::debug!(max_rps = self.inner.max_rps, period = ?period, "Starting token refill task");
            tokio::spawn(refill(tokens.clone(), capacity, period, stop.clone()));

            Bucket {
                tokens,
                _refill: stop.drop_guard(),
            }
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::disabled()
    }
}

fn refill_period(max_rps: u32) -> Duration {
    (Duration::from_secs(1) / max_rps.max(1)).max(Duration::from_nanos(1))
}

async fn refill(tokens: Arc<Semaphore>, capacity: usize, period: Duration, stop: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                // Full bucket: drop the deposit.
                if tokens.available_permits() < capacity {
                    tokens.add_permits(1);
                }
            }
        }
    }

    tokens.close();
    tracing::debug!("Token refill task stopped");
}

/// Applies a [`RateLimiter`] in front of a transport.
#[derive(Clone, Debug)]
pub struct RateLimitLayer {
    limiter: RateLimiter,
}

impl RateLimitLayer {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimit<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimit {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

/// Service that takes a token, then dispatches to the inner transport.
///
/// Inner errors become [`Error::Transport`].
#[derive(Clone, Debug)]
pub struct RateLimit<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S> Service<Request<Body>> for RateLimit<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is driven on the clone taken in `call`, after the token.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let limiter = self.limiter.clone();
        let cancel = cancellation_of(req.extensions());

        Box::pin(async move {
            limiter.acquire(&cancel).await?;
            inner
                .oneshot(req)
                .await
                .map_err(|e| Error::Transport(e.into()))
        })
    }
}
