//! HTTP client implementation

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

use super::{BodyStream, Headers, HttpTransport, Request, Response};
use crate::utils::{Result, TransportError};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// How long idle pooled connections are kept
    pub pool_idle_timeout: Duration,
    /// Maximum redirects followed before failing
    pub max_redirects: usize,
    /// Transparently decompress gzip/brotli/deflate bodies
    pub decompress: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(30),
            max_redirects: 10,
            decompress: true,
        }
    }
}

/// reqwest-backed [`HttpTransport`] with streaming bodies
#[derive(Debug, Clone)]
pub struct NetworkClient {
    client: reqwest::Client,
    config: NetworkConfig,
}

impl NetworkClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(NetworkConfig::default())
    }

    /// Create a new HTTP client
    pub fn with_config(config: NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .gzip(config.decompress)
            .brotli(config.decompress)
            .deflate(config.decompress)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

impl NetworkClient {
    /// Translate a [`Request`] into a reqwest request
    ///
    /// Caller headers go out as set. The credentials mode only concerns
    /// ambient credentials, and this client keeps none.
    fn build(&self, mut request: Request) -> std::result::Result<reqwest::Request, TransportError> {
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        log::trace!(
            "{} {} (credentials: {:?})",
            request.method().as_str(),
            request.url(),
            request.credentials_mode()
        );

        let mut builder = self.client.request(method, request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.take_body() {
            builder = builder.body(body);
        }
        builder.build().map_err(|e| TransportError::Connection(e.to_string()))
    }
}

#[async_trait]
impl HttpTransport for NetworkClient {
    async fn fetch(
        &self,
        request: Request,
        signal: CancellationToken,
    ) -> std::result::Result<Response, TransportError> {
        let request = self.build(request)?;

        let resp = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(TransportError::Aborted),
            resp = self.client.execute(request) => resp.map_err(|e| TransportError::Connection(e.to_string()))?,
        };

        let url = resp.url().to_string();
        let status = resp.status();
        let headers: Headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str(), String::from_utf8_lossy(v.as_bytes())))
            .collect();

        let chunks = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Body(e.to_string())));
        let body = cancellable(Box::pin(chunks), signal);

        Ok(Response::new(url, status.as_u16(), headers, body)
            .with_status_text(status.canonical_reason().unwrap_or("")))
    }
}

/// Ends `body` with [`TransportError::Aborted`] once `signal` fires
fn cancellable(body: BodyStream, signal: CancellationToken) -> BodyStream {
    Box::pin(stream::unfold(
        (body, signal, false),
        |(mut body, signal, finished)| async move {
            if finished {
                return None;
            }
            tokio::select! {
                biased;
                _ = signal.cancelled() => Some((Err(TransportError::Aborted), (body, signal, true))),
                next = body.next() => next.map(|item| (item, (body, signal, false))),
            }
        },
    ))
}
