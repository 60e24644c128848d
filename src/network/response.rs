//! HTTP response types
//!
//! A [`Response`] carries everything known once the status line and headers
//! have arrived. The body is not buffered: it is exposed as a [`BodyStream`]
//! of chunks so callers can decide between draining it and reading it
//! incrementally.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use futures::stream;

use crate::utils::TransportError;

/// Chunked response body
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Response header collection
///
/// Names are stored lower-cased and looked up case-insensitively. Iteration
/// follows the order in which names were first inserted; a repeated name is
/// folded into the existing entry with `", "`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, merging with an existing entry of the same name
    pub fn append(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => self.entries.push((name, value.to_string())),
        }
    }

    /// Replace any existing value for `name`
    pub fn set(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.entries.push((name, value.to_string())),
        }
    }

    /// Get a header value
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k.as_ref(), v.as_ref());
        }
        headers
    }
}

/// HTTP response
pub struct Response {
    url: String,
    status: u16,
    status_text: String,
    headers: Headers,
    body: BodyStream,
}

impl Response {
    /// Create a new response
    pub fn new(url: impl Into<String>, status: u16, headers: Headers, body: BodyStream) -> Self {
        Self {
            url: url.into(),
            status,
            status_text: canonical_reason(status).to_string(),
            headers,
            body,
        }
    }

    /// Create a response whose body is already in memory, split into chunks
    pub fn from_chunks<I>(url: impl Into<String>, status: u16, headers: Headers, chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        let chunks: Vec<Result<Bytes, TransportError>> =
            chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self::new(url, status, headers, Box::pin(stream::iter(chunks)))
    }

    /// Override the reason phrase
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// Final URL of the response (after redirects, if any)
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Split into metadata and body stream
    pub fn into_parts(self) -> (ResponseHead, BodyStream) {
        (
            ResponseHead {
                url: self.url,
                status: self.status,
                status_text: self.status_text,
                headers: self.headers,
            },
            self.body,
        )
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Status line and headers of a [`Response`]
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
}

/// Get status text for code
pub fn canonical_reason(code: u16) -> &'static str {
    reqwest::StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}
