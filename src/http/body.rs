//! Request bodies and per-request cancellation.
//!
//! # Responsibilities
//! - Model whether a body can be sent more than once
//! - Produce a fresh wire body for each attempt
//! - Carry the caller's cancellation token in request extensions
//!
//! # Design Decisions
//! - `RequestBody` is a tagged variant so a single-use body can never
//!   be retried by accident
//! - Wire bodies use `axum::body::Body`, the same type the transport sends

use std::fmt;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::Request;
use tokio_util::sync::CancellationToken;
use tower::BoxError;

use crate::error::Error;

/// Zero-argument provider yielding a fresh body stream on demand.
#[derive(Clone)]
pub struct BodyFactory(Arc<dyn Fn() -> Result<Body, BoxError> + Send + Sync>);

impl BodyFactory {
    /// Wrap a closure that builds a new body each time it is called.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Result<Body, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Acquire a fresh body.
    pub fn acquire(&self) -> Result<Body, BoxError> {
        (self.0)()
    }
}

impl fmt::Debug for BodyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BodyFactory")
    }
}

/// Body of a request entering the retry layer.
#[derive(Debug, Default)]
pub enum RequestBody {
    /// No payload.
    #[default]
    Empty,
    /// A stream that can only be sent once; disables retries.
    SingleUse(Body),
    /// A payload that can be re-acquired for every attempt.
    Replayable(BodyFactory),
}

impl RequestBody {
    /// A replayable body over in-memory bytes.
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        RequestBody::Replayable(BodyFactory::new(move || Ok(Body::from(bytes.clone()))))
    }

    /// A replayable body built by `f` for every attempt.
    pub fn replayable<F>(f: F) -> Self
    where
        F: Fn() -> Result<Body, BoxError> + Send + Sync + 'static,
    {
        RequestBody::Replayable(BodyFactory::new(f))
    }

    /// A single-use streaming body.
    pub fn single_use(body: Body) -> Self {
        RequestBody::SingleUse(body)
    }

    /// True when the request may be dispatched more than once.
    pub fn is_replayable(&self) -> bool {
        !matches!(self, RequestBody::SingleUse(_))
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::bytes(bytes)
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::bytes(s)
    }
}

impl From<&'static str> for RequestBody {
    fn from(s: &'static str) -> Self {
        RequestBody::bytes(s)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::bytes(v)
    }
}

/// Body source for the attempt loop once the request has been split.
///
/// The single-use stream is taken out on first use.
#[derive(Debug)]
pub(crate) enum AttemptBody {
    Empty,
    SingleUse(Option<Body>),
    Replayable(BodyFactory),
}

impl AttemptBody {
    pub(crate) fn next(&mut self) -> Result<Body, Error> {
        match self {
            AttemptBody::Empty => Ok(Body::empty()),
            AttemptBody::SingleUse(body) => Ok(body.take().unwrap_or_else(Body::empty)),
            AttemptBody::Replayable(factory) => factory.acquire().map_err(Error::BodyReplay),
        }
    }
}

impl From<RequestBody> for AttemptBody {
    fn from(body: RequestBody) -> Self {
        match body {
            RequestBody::Empty => AttemptBody::Empty,
            RequestBody::SingleUse(body) => AttemptBody::SingleUse(Some(body)),
            RequestBody::Replayable(factory) => AttemptBody::Replayable(factory),
        }
    }
}

/// Cancellation helpers on `http::Request`.
pub trait RequestExt {
    /// Attach a cancellation token to this request.
    fn with_cancellation(self, token: CancellationToken) -> Self;

    /// The attached token, or a fresh one that never fires.
    fn cancellation(&self) -> CancellationToken;
}

impl<B> RequestExt for Request<B> {
    fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.extensions_mut().insert(token);
        self
    }

    fn cancellation(&self) -> CancellationToken {
        cancellation_of(self.extensions())
    }
}

pub(crate) fn cancellation_of(extensions: &axum::http::Extensions) -> CancellationToken {
    extensions
        .get::<CancellationToken>()
        .cloned()
        .unwrap_or_else(CancellationToken::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(body: Body) -> Bytes {
        axum::body::to_bytes(body, usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn replayable_bytes_yield_fresh_copies() {
        let mut attempt = AttemptBody::from(RequestBody::from("payload"));
        assert_eq!(collect(attempt.next().unwrap()).await, "payload");
        assert_eq!(collect(attempt.next().unwrap()).await, "payload");
    }

    #[tokio::test]
    async fn single_use_is_taken_once() {
        let body = RequestBody::single_use(Body::from("once"));
        assert!(!body.is_replayable());
        let mut attempt = AttemptBody::from(body);
        assert_eq!(collect(attempt.next().unwrap()).await, "once");
        assert!(collect(attempt.next().unwrap()).await.is_empty());
    }

    #[test]
    fn factory_failure_maps_to_body_replay() {
        let mut attempt = AttemptBody::from(RequestBody::replayable(|| Err("gone".into())));
        let err = attempt.next().unwrap_err();
        assert!(matches!(err, Error::BodyReplay(_)));
    }

    #[test]
    fn cancellation_round_trips_through_extensions() {
        let token = CancellationToken::new();
        let req = Request::new(()).with_cancellation(token.clone());
        token.cancel();
        assert!(req.cancellation().is_cancelled());

        let bare = Request::new(());
        assert!(!bare.cancellation().is_cancelled());
    }
}
