//! Drop-in HTTP client with rate limiting and retries.
//!
//! ```text
//! RetryClient → Retry → RateLimit → base transport
//! ```

use axum::body::Body;
use axum::http::{Method, Request, Response, Uri};
use tokio_util::sync::CancellationToken;
use tower::{BoxError, Layer, Service, ServiceExt};

use crate::config::{ClientConfig, RetrySettings};
use crate::error::Error;
use crate::http::{DefaultTransport, HyperTransport, RequestBody, RequestExt};
use crate::resilience::{RateLimit, RateLimitLayer, RateLimiter, Retry, RetryLayer};

/// HTTP client that throttles dispatch and retries transient failures.
///
/// Clones share the rate limiter and the underlying transport.
#[derive(Clone, Debug)]
pub struct RetryClient<T = DefaultTransport> {
    service: Retry<RateLimit<T>>,
    limiter: RateLimiter,
    settings: RetrySettings,
}

impl RetryClient<DefaultTransport> {
    /// Build a client over the hyper transport with the configured timeout.
    pub fn new(config: &ClientConfig) -> Self {
        let settings = config.resolve();
        let transport = HyperTransport::new().with_timeout(settings.timeout);
        Self::from_settings(settings, transport)
    }
}

impl Default for RetryClient<DefaultTransport> {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl<T> RetryClient<T>
where
    T: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    T::Error: Into<BoxError>,
    T::Future: Send + 'static,
{
    /// Build a client over a caller-supplied base transport.
    pub fn with_transport(config: &ClientConfig, transport: T) -> Self {
        Self::from_settings(config.resolve(), transport)
    }

    fn from_settings(settings: RetrySettings, transport: T) -> Self {
        let limiter = RateLimiter::new(settings.max_rps);
        let service = RetryLayer::new(settings)
            .layer(RateLimitLayer::new(limiter.clone()).layer(transport));

        tracing::debug!(
            max_rps = settings.max_rps,
            max_retries = settings.max_retries,
            initial_backoff = ?settings.initial_backoff,
            max_backoff = ?settings.max_backoff,
            "Retry client built"
        );

        Self {
            service,
            limiter,
            settings,
        }
    }

    /// Send a request through the limiter and retry loop.
    pub async fn send(&self, req: Request<RequestBody>) -> Result<Response<Body>, Error> {
        self.service.clone().oneshot(req).await
    }

    /// Issue a GET for `uri`.
    pub async fn get(&self, uri: Uri) -> Result<Response<Body>, Error> {
        self.send(build_request(Method::GET, uri, RequestBody::Empty)).await
    }

    /// Issue a GET for `uri` that aborts when `cancel` fires.
    pub async fn get_with_cancellation(
        &self,
        uri: Uri,
        cancel: CancellationToken,
    ) -> Result<Response<Body>, Error> {
        self.send(build_request(Method::GET, uri, RequestBody::Empty).with_cancellation(cancel))
            .await
    }

    /// Issue a request with an arbitrary method and body.
    pub async fn request(
        &self,
        method: Method,
        uri: Uri,
        body: impl Into<RequestBody>,
    ) -> Result<Response<Body>, Error> {
        self.send(build_request(method, uri, body.into())).await
    }
}

impl<T> RetryClient<T> {
    /// The shared rate limiter.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Resolved settings in effect.
    pub fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    /// Stop the limiter's refill task; later calls fail with `LimiterClosed`
    /// when rate limiting is enabled.
    pub fn shutdown(&self) {
        self.limiter.shutdown();
    }
}

impl<T> Service<Request<RequestBody>> for RetryClient<T>
where
    Retry<RateLimit<T>>: Service<Request<RequestBody>, Response = Response<Body>, Error = Error>,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = <Retry<RateLimit<T>> as Service<Request<RequestBody>>>::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, req: Request<RequestBody>) -> Self::Future {
        self.service.call(req)
    }
}

fn build_request(method: Method, uri: Uri, body: RequestBody) -> Request<RequestBody> {
    let mut req = Request::new(body);
    *req.method_mut() = method;
    *req.uri_mut() = uri;
    req
}
