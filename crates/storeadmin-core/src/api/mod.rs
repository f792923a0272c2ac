//! REST API client for the demo store.
//!
//! Every call goes through the `RequestPipeline`, which attaches the bearer
//! token and transparently refreshes an expired session once per call.

pub mod client;
pub mod error;
pub mod pipeline;
pub mod request;
pub mod transport;

pub use client::ApiClient;
pub use error::{ApiError, TransportError};
pub use pipeline::{authorize, classify, Attempt, Outcome, RequestPipeline};
pub use request::{ApiRequest, ApiResponse};
pub use transport::{ReqwestTransport, Transport};
