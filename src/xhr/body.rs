//! Response consumption strategy
//!
//! A body is either drained and decoded once ([`ConsumptionMode::Buffered`]) or
//! decoded again after every chunk ([`ConsumptionMode::Incremental`]). In both
//! cases the decoder always sees the *whole* accumulated byte sequence, never
//! just the newest chunk.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use super::state::ResponseType;
use crate::utils::Result;

/// Media type that switches a response to incremental consumption
pub const NDJSON_MEDIA_TYPE: &str = "application/x-ndjson";

/// MIME used when neither an override nor a `content-type` is present
pub const FALLBACK_MIME: &str = "text/plain";

/// Binary object tagged with a MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    mime: String,
    data: Bytes,
}

impl Blob {
    pub fn new(data: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            data: data.into(),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn text(&self) -> String {
        decode_utf8(&self.data)
    }

    /// `data:` URL with a base64 payload
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }
}

/// Decoded `response` value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum XhrResponse {
    #[default]
    Null,
    Text(String),
    Blob(Blob),
    ArrayBuffer(Bytes),
    Json(serde_json::Value),
}

impl XhrResponse {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Self::Blob(blob) => Some(blob),
            _ => None,
        }
    }

    pub fn as_array_buffer(&self) -> Option<&Bytes> {
        match self {
            Self::ArrayBuffer(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// How the body stream is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumptionMode {
    Buffered,
    Incremental,
}

impl ConsumptionMode {
    /// Incremental for NDJSON responses or when the caller forces streaming
    pub fn select(content_type: Option<&str>, prefer_streaming: bool) -> Self {
        let ndjson = content_type
            .map(|ct| ct.to_ascii_lowercase().contains(NDJSON_MEDIA_TYPE))
            .unwrap_or(false);
        if ndjson || prefer_streaming {
            Self::Incremental
        } else {
            Self::Buffered
        }
    }
}

/// Turns accumulated body bytes into a [`XhrResponse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoder {
    response_type: ResponseType,
    mime: String,
}

impl Decoder {
    /// Effective MIME: override, then `content-type`, then `text/plain`
    pub fn new(response_type: ResponseType, mime_override: &str, content_type: Option<&str>) -> Self {
        let mime = if !mime_override.is_empty() {
            mime_override
        } else {
            content_type.filter(|ct| !ct.is_empty()).unwrap_or(FALLBACK_MIME)
        };
        Self {
            response_type: response_type.resolve(),
            mime: mime.to_string(),
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<XhrResponse> {
        let response = match self.response_type {
            ResponseType::Blob => XhrResponse::Blob(Blob::new(Bytes::copy_from_slice(bytes), self.mime.clone())),
            ResponseType::ArrayBuffer => XhrResponse::ArrayBuffer(Bytes::copy_from_slice(bytes)),
            ResponseType::Json => XhrResponse::Json(serde_json::from_str(&decode_utf8(bytes))?),
            ResponseType::Text | ResponseType::Default => XhrResponse::Text(decode_utf8(bytes)),
        };
        Ok(response)
    }
}

/// Lossy UTF-8 decode with a leading byte-order mark removed
fn decode_utf8(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_selection() {
        assert_eq!(ConsumptionMode::select(Some("application/x-ndjson"), false), ConsumptionMode::Incremental);
        assert_eq!(
            ConsumptionMode::select(Some("application/x-ndjson; charset=utf-8"), false),
            ConsumptionMode::Incremental
        );
        assert_eq!(ConsumptionMode::select(Some("application/json"), false), ConsumptionMode::Buffered);
        assert_eq!(ConsumptionMode::select(None, false), ConsumptionMode::Buffered);
        assert_eq!(ConsumptionMode::select(None, true), ConsumptionMode::Incremental);
    }

    #[test]
    fn test_effective_mime() {
        assert_eq!(Decoder::new(ResponseType::Blob, "application/json", Some("text/html")).mime(), "application/json");
        assert_eq!(Decoder::new(ResponseType::Blob, "", Some("text/html")).mime(), "text/html");
        assert_eq!(Decoder::new(ResponseType::Blob, "", None).mime(), "text/plain");
    }

    #[test]
    fn test_decode_text() {
        let decoder = Decoder::new(ResponseType::Default, "", None);
        let text = decoder.decode("\u{feff}héllo".as_bytes()).unwrap();
        assert_eq!(text.as_text(), Some("héllo"));

        let lossy = decoder.decode(&[0x66, 0xff]).unwrap();
        assert_eq!(lossy.as_text(), Some("f\u{fffd}"));
    }

    #[test]
    fn test_decode_json() {
        let decoder = Decoder::new(ResponseType::Json, "", Some("application/json"));
        let value = decoder.decode(br#"{"a":[1,2]}"#).unwrap();
        assert_eq!(value.as_json(), Some(&json!({"a": [1, 2]})));

        assert!(decoder.decode(br#"{"a":"#).is_err());
    }

    #[test]
    fn test_decode_binary() {
        let blob = Decoder::new(ResponseType::Blob, "", Some("image/png")).decode(b"\x89PNG").unwrap();
        let blob = blob.as_blob().unwrap();
        assert_eq!(blob.mime_type(), "image/png");
        assert_eq!(blob.size(), 4);

        let buffer = Decoder::new(ResponseType::ArrayBuffer, "", None).decode(b"\x00\x01").unwrap();
        assert_eq!(buffer.as_array_buffer().map(|b| b.as_ref()), Some(&b"\x00\x01"[..]));
    }

    #[test]
    fn test_blob_data_url() {
        let blob = Blob::new("hi", "text/plain");
        assert_eq!(blob.to_data_url(), "data:text/plain;base64,aGk=");
        assert_eq!(blob.text(), "hi");
    }
}
