//! Field store for one emulated request

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::body::XhrResponse;
use super::headers::RequestHeaders;
use crate::network::Headers;
use crate::utils::XhrError;

/// XMLHttpRequest state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum ReadyState {
    #[default]
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

impl ReadyState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ReadyState {
    type Error = XhrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unsent),
            1 => Ok(Self::Opened),
            2 => Ok(Self::HeadersReceived),
            3 => Ok(Self::Loading),
            4 => Ok(Self::Done),
            other => Err(XhrError::InvalidState(format!("no readyState {other}"))),
        }
    }
}

/// Requested decoding of the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseType {
    /// The empty string; decodes like `Text`
    #[default]
    Default,
    Text,
    Blob,
    ArrayBuffer,
    Json,
}

impl ResponseType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "",
            Self::Text => "text",
            Self::Blob => "blob",
            Self::ArrayBuffer => "arraybuffer",
            Self::Json => "json",
        }
    }

    /// Effective type used for decoding
    pub fn resolve(self) -> Self {
        match self {
            Self::Default => Self::Text,
            other => other,
        }
    }
}

impl FromStr for ResponseType {
    type Err = XhrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::Default),
            "text" => Ok(Self::Text),
            "blob" => Ok(Self::Blob),
            "arraybuffer" => Ok(Self::ArrayBuffer),
            "json" => Ok(Self::Json),
            other => Err(XhrError::InvalidResponseType(other.to_string())),
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable fields of an [`XmlHttpRequest`](super::XmlHttpRequest)
#[derive(Debug)]
pub(crate) struct RequestState {
    pub ready_state: ReadyState,
    pub method: String,
    pub url: String,
    pub request_headers: RequestHeaders,
    pub response_headers: Headers,
    /// Empty means no override
    pub mime_override: String,
    pub response_type: ResponseType,
    pub response: XhrResponse,
    pub response_url: String,
    pub status: u16,
    pub status_text: String,
    pub timeout: Duration,
    pub with_credentials: bool,
    pub stream_request_bad_for_performance: bool,
    pub errored: bool,
    pub timed_out: bool,
    /// Whether `responseText` is readable for the current send
    pub is_response_text: bool,
    /// Bumped by every `send`; a timer only acts on its own send
    pub generation: u64,
    /// The current send has picked its terminal event
    pub settled: bool,
    pub timer: Option<JoinHandle<()>>,
}

impl RequestState {
    pub fn new() -> Self {
        Self {
            ready_state: ReadyState::Unsent,
            method: String::new(),
            url: String::new(),
            request_headers: RequestHeaders::new(),
            response_headers: Headers::new(),
            mime_override: String::new(),
            response_type: ResponseType::Default,
            response: XhrResponse::Null,
            response_url: String::new(),
            status: 0,
            status_text: String::new(),
            timeout: Duration::ZERO,
            with_credentials: false,
            stream_request_bad_for_performance: false,
            errored: false,
            timed_out: false,
            is_response_text: true,
            generation: 0,
            settled: true,
            timer: None,
        }
    }

    /// Clear the outputs of a previous exchange ahead of a new `open`
    pub fn reset_outputs(&mut self) {
        self.status = 0;
        self.status_text.clear();
        self.response_url.clear();
        self.response = XhrResponse::Null;
        self.response_headers = Headers::new();
        self.errored = false;
        self.timed_out = false;
    }

    /// Response headers are hidden before they arrive and after a failure
    pub fn response_headers_visible(&self) -> bool {
        !self.errored && self.ready_state >= ReadyState::HeadersReceived
    }
}
