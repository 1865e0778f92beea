//! HTTP plumbing shared by the layers.
//!
//! # Data Flow
//! ```text
//! Request<RequestBody> (caller)
//!     → body.rs (split into parts + attempt body, one fresh Body per attempt)
//!     → resilience layers
//!     → transport.rs (hyper-util client, overall deadline)
//!     → Response<Body>
//! ```

pub mod body;
pub mod transport;

pub use body::{BodyFactory, RequestBody, RequestExt};
pub use transport::{DefaultTransport, HyperTransport};
