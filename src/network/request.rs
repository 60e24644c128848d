//! HTTP request types

use bytes::Bytes;

use crate::utils::{Result, TransportError};

/// HTTP methods
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    /// Any other token, kept upper-cased
    Extension(String),
}

impl Method {
    /// Parse method from string, case-insensitively
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            "PATCH" => Self::Patch,
            other => Self::Extension(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Extension(token) => token,
        }
    }
}

/// Credentials mode for the transport call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMode {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

impl CredentialsMode {
    /// Mode selected by the legacy `withCredentials` flag
    pub fn from_with_credentials(with_credentials: bool) -> Self {
        if with_credentials {
            Self::Include
        } else {
            Self::SameOrigin
        }
    }
}

/// HTTP request handed to a transport
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: url::Url,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    credentials: CredentialsMode,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let url = url::Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            credentials: CredentialsMode::default(),
        })
    }

    /// Create a GET request
    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::Get, url)
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the request body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the credentials mode
    pub fn credentials(mut self, mode: CredentialsMode) -> Self {
        self.credentials = mode;
        self
    }

    pub fn url(&self) -> &url::Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Headers in the order they were added
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header, matched case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn credentials_mode(&self) -> CredentialsMode {
        self.credentials
    }

    /// Take the body out, leaving `None`
    pub fn take_body(&mut self) -> Option<Bytes> {
        self.body.take()
    }
}
