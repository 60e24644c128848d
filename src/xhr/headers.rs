//! Header store
//!
//! Outgoing headers follow the legacy multi-value convention: setting a name
//! twice joins the values with `", "` instead of replacing. Incoming headers are
//! kept as the transport reported them and serialized on demand.

use crate::network::Headers;

/// Outgoing header collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    inner: Headers,
}

impl RequestHeaders {
    /// New collection carrying the legacy `accept: */*` default
    pub fn new() -> Self {
        let mut inner = Headers::new();
        inner.append("accept", "*/*");
        Self { inner }
    }

    /// `setRequestHeader` semantics: store, or append with `", "`
    pub fn set(&mut self, name: &str, value: &str) {
        self.inner.append(name, value);
    }

    /// Overwrite regardless of what the caller set
    pub fn force(&mut self, name: &str, value: &str) {
        self.inner.set(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for RequestHeaders {
    fn default() -> Self {
        Self::new()
    }
}

/// `getAllResponseHeaders` serialization
pub fn serialize_headers(headers: &Headers) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_accept() {
        let headers = RequestHeaders::new();
        assert_eq!(headers.get("Accept"), Some("*/*"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_set_merges_case_insensitively() {
        let mut headers = RequestHeaders::new();
        headers.set("X-Trace", "a");
        headers.set("x-trace", "b");
        headers.set("X-TRACE", "c");

        assert_eq!(headers.get("x-trace"), Some("a, b, c"));
        assert!(headers.iter().any(|(k, _)| k == "x-trace"));
    }

    #[test]
    fn test_force_overwrites() {
        let mut headers = RequestHeaders::new();
        headers.set("User-Agent", "custom/1.0");
        headers.force("user-agent", "fixed/1.0");

        assert_eq!(headers.get("user-agent"), Some("fixed/1.0"));
    }

    #[test]
    fn test_serialize_headers() {
        let headers: Headers = [("Content-Type", "text/plain"), ("X-A", "1")].into_iter().collect();
        assert_eq!(serialize_headers(&headers), "content-type: text/plain\r\nx-a: 1");
        assert_eq!(serialize_headers(&Headers::new()), "");
    }

    proptest! {
        #[test]
        fn test_merge_property(name in "[A-Za-z][A-Za-z0-9-]{0,15}", v1 in "[ -~]{0,20}", v2 in "[ -~]{0,20}") {
            prop_assume!(!name.eq_ignore_ascii_case("accept"));
            let mut headers = RequestHeaders::new();
            headers.set(&name, &v1);
            headers.set(&name.to_ascii_uppercase(), &v2);

            let expected = format!("{}, {}", v1, v2);
            prop_assert_eq!(headers.get(&name.to_ascii_lowercase()), Some(expected.as_str()));
        }
    }
}
