//! Transport layer for xhr-shim
//!
//! The emulated request never talks to sockets itself. It hands a fully
//! assembled [`Request`] and a cancellation token to an [`HttpTransport`] and
//! reads back a [`Response`] whose body arrives as a stream of chunks.
//! [`NetworkClient`] is the default transport, backed by reqwest.

mod client;
mod request;
mod response;

pub use client::{NetworkClient, NetworkConfig};
pub use request::{CredentialsMode, Method, Request};
pub use response::{BodyStream, Headers, Response, ResponseHead, canonical_reason};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::utils::TransportError;

/// Promise-style HTTP call primitive
///
/// Implementations resolve once the status line and headers are known. After
/// `signal` is cancelled they should fail with [`TransportError::Aborted`],
/// both while waiting for headers and while the body is being streamed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue one request
    async fn fetch(
        &self,
        request: Request,
        signal: CancellationToken,
    ) -> Result<Response, TransportError>;
}
