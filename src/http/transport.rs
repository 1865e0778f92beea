//! Base transport that performs the actual network exchange.
//!
//! # Responsibilities
//! - Send one request over hyper's pooled client
//! - Convert the response body into the shared `Body` type
//! - Enforce an overall deadline on the exchange
//!
//! # Design Decisions
//! - Connection pooling, TLS and DNS stay inside hyper-util
//! - The deadline is `tower::timeout`, so a timeout is an ordinary
//!   transport error and is retried like one

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower::timeout::Timeout;
use tower::{BoxError, Service};

/// Base transport with the default deadline applied.
pub type DefaultTransport = Timeout<HyperTransport>;

/// Plain HTTP transport backed by hyper-util's legacy client.
#[derive(Clone, Debug)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
}

impl HyperTransport {
    /// Create a transport with a fresh connection pool.
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }

    /// Wrap the transport in an overall per-request deadline.
    pub fn with_timeout(self, timeout: Duration) -> DefaultTransport {
        Timeout::new(self, timeout)
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn into_shared_body(response: Response<Incoming>) -> Response<Body> {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}

impl Service<Request<Body>> for HyperTransport {
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let fut = self.client.request(req);
        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    tracing::trace!(%method, %uri, status = %response.status(), "Upstream responded");
                    Ok(into_shared_body(response))
                }
                Err(e) => {
                    tracing::debug!(%method, %uri, error = %e, "Upstream request failed");
                    Err(e.into())
                }
            }
        })
    }
}
