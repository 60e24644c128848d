//! XMLHttpRequest emulation
//!
//! [`XmlHttpRequest`] reproduces the legacy request object on top of an
//! [`HttpTransport`]. The handle is cheap to clone; every clone drives the same
//! request, which is how event handlers get at the response:
//!
//! ```no_run
//! use xhr_shim::{NetworkClient, ResponseType, XmlHttpRequest};
//!
//! # async fn run() -> xhr_shim::Result<()> {
//! let xhr = XmlHttpRequest::new(NetworkClient::new()?);
//! let reader = xhr.clone();
//! xhr.set_onload(move |_| println!("{:?}", reader.response()));
//! xhr.set_response_type(ResponseType::Json);
//! xhr.open("GET", "https://example.com/data.json");
//! xhr.send(None).await;
//! # Ok(())
//! # }
//! ```

mod body;
mod dispatch;
mod events;
mod headers;
mod state;

pub use body::{Blob, ConsumptionMode, Decoder, FALLBACK_MIME, NDJSON_MEDIA_TYPE, XhrResponse};
pub use dispatch::{ORIGIN, REFERER, USER_AGENT, XhrOutcome};
pub use events::{EventHandler, EventTarget, ListenerId, XhrEvent, XhrEventType};
pub use headers::{RequestHeaders, serialize_headers};
pub use state::{ReadyState, ResponseType};

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::network::{HttpTransport, NetworkClient};
use crate::utils::{Result, XhrError};
use state::RequestState;

macro_rules! handler_slots {
    ($($setter:ident => $event:ident),* $(,)?) => {
        $(
            pub fn $setter(&self, handler: impl Fn(&XhrEvent) + Send + Sync + 'static) {
                self.set_event_handler(XhrEventType::$event, Some(Arc::new(handler)));
            }
        )*
    };
}

/// Upload side of the request
///
/// Upload progress cannot be observed through the transport, so listener
/// registration here is accepted and ignored.
#[derive(Debug, Default)]
pub struct XhrUpload;

impl XhrUpload {
    pub fn add_event_listener(&self, _event_type: XhrEventType, _handler: impl Fn(&XhrEvent) + Send + Sync + 'static) {}
}

struct Inner {
    state: Mutex<RequestState>,
    events: Mutex<EventTarget>,
    signal: CancellationToken,
    transport: Arc<dyn HttpTransport>,
    upload: XhrUpload,
}

/// XMLHttpRequest for legacy AJAX support
#[derive(Clone)]
pub struct XmlHttpRequest {
    inner: Arc<Inner>,
}

impl XmlHttpRequest {
    pub const UNSENT: ReadyState = ReadyState::Unsent;
    pub const OPENED: ReadyState = ReadyState::Opened;
    pub const HEADERS_RECEIVED: ReadyState = ReadyState::HeadersReceived;
    pub const LOADING: ReadyState = ReadyState::Loading;
    pub const DONE: ReadyState = ReadyState::Done;

    /// Create a new XMLHttpRequest over `transport`
    pub fn new(transport: impl HttpTransport + 'static) -> Self {
        Self::with_shared_transport(Arc::new(transport))
    }

    /// Create a new XMLHttpRequest sharing a transport with other requests
    pub fn with_shared_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RequestState::new()),
                events: Mutex::new(EventTarget::new()),
                signal: CancellationToken::new(),
                transport,
                upload: XhrUpload,
            }),
        }
    }

    /// Create a new XMLHttpRequest over a default [`NetworkClient`]
    pub fn with_default_client() -> Result<Self> {
        Ok(Self::new(NetworkClient::new()?))
    }

    fn state(&self) -> MutexGuard<'_, RequestState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn events(&self) -> MutexGuard<'_, EventTarget> {
        self.inner.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state().ready_state
    }

    /// Store a new readyState and announce it; same-value writes are ignored
    pub(crate) fn set_ready_state(&self, value: ReadyState) {
        let previous = {
            let mut state = self.state();
            if state.ready_state == value {
                return;
            }
            std::mem::replace(&mut state.ready_state, value)
        };
        log::trace!("readyState {:?} -> {:?}", previous, value);
        self.dispatch(XhrEvent::new(XhrEventType::ReadyStateChange));
    }

    /// Run the slot handler and all listeners for `event`
    ///
    /// No lock is held while handlers run, so they may call back into the
    /// request.
    pub(crate) fn dispatch(&self, event: XhrEvent) {
        let due = self.events().take_due(event.event_type);
        for handler in due {
            handler(&event);
        }
    }

    /// Open a request
    pub fn open(&self, method: &str, url: &str) {
        {
            let mut state = self.state();
            state.reset_outputs();
            state.method = method.to_string();
            state.url = url.to_string();
        }
        self.set_ready_state(ReadyState::Opened);
    }

    /// Set a request header, appending to any earlier value
    pub fn set_request_header(&self, name: &str, value: &str) {
        self.state().request_headers.set(name, value);
    }

    /// Force the MIME type used when decoding the response
    pub fn override_mime_type(&self, mime: &str) {
        self.state().mime_override = mime.to_string();
    }

    /// Cancel the in-flight exchange
    ///
    /// The `abort` event itself is emitted by the pending `send` once it sees
    /// the cancellation.
    pub fn abort(&self) {
        {
            let mut state = self.state();
            self.inner.signal.cancel();
            state.status = 0;
        }
        self.set_ready_state(ReadyState::Unsent);
    }

    /// Get a response header
    pub fn get_response_header(&self, name: &str) -> Option<String> {
        let state = self.state();
        if !state.response_headers_visible() {
            return None;
        }
        state.response_headers.get(name).map(str::to_string)
    }

    /// Get all response headers
    pub fn get_all_response_headers(&self) -> String {
        let state = self.state();
        if !state.response_headers_visible() {
            return String::new();
        }
        serialize_headers(&state.response_headers)
    }

    pub fn response(&self) -> XhrResponse {
        self.state().response.clone()
    }

    /// `None` after an error; `""` until headers arrive
    pub fn response_text(&self) -> Result<Option<String>> {
        let state = self.state();
        if state.errored {
            return Ok(None);
        }
        if state.ready_state < ReadyState::HeadersReceived {
            return Ok(Some(String::new()));
        }
        if !state.is_response_text {
            return Err(XhrError::InvalidState("response type not set to text".to_string()));
        }
        Ok(Some(state.response.as_text().unwrap_or_default().to_string()))
    }

    /// XML responses are not parsed
    pub fn response_xml(&self) -> Result<()> {
        Err(XhrError::NotSupported("XML responses".to_string()))
    }

    pub fn response_type(&self) -> ResponseType {
        self.state().response_type
    }

    pub fn set_response_type(&self, response_type: ResponseType) {
        self.state().response_type = response_type;
    }

    pub fn response_url(&self) -> String {
        self.state().response_url.clone()
    }

    pub fn status(&self) -> u16 {
        self.state().status
    }

    pub fn status_text(&self) -> String {
        self.state().status_text.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.state().timeout
    }

    /// Zero disables the timeout
    pub fn set_timeout(&self, timeout: Duration) {
        self.state().timeout = timeout;
    }

    pub fn with_credentials(&self) -> bool {
        self.state().with_credentials
    }

    pub fn set_with_credentials(&self, with_credentials: bool) {
        self.state().with_credentials = with_credentials;
    }

    /// Read every response incrementally, whatever its content type
    pub fn set_stream_request_bad_for_performance(&self, enabled: bool) {
        self.state().stream_request_bad_for_performance = enabled;
    }

    pub fn stream_request_bad_for_performance(&self) -> bool {
        self.state().stream_request_bad_for_performance
    }

    pub fn upload(&self) -> &XhrUpload {
        &self.inner.upload
    }

    /// Register a listener
    pub fn add_event_listener(
        &self,
        event_type: XhrEventType,
        handler: impl Fn(&XhrEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.events().add_listener(event_type, Arc::new(handler), false)
    }

    /// Register a listener removed after its first call
    pub fn add_event_listener_once(
        &self,
        event_type: XhrEventType,
        handler: impl Fn(&XhrEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.events().add_listener(event_type, Arc::new(handler), true)
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.events().remove_listener(id)
    }

    /// Fill or clear an `on<event>` slot
    pub fn set_event_handler(&self, event_type: XhrEventType, handler: Option<EventHandler>) {
        log::trace!(
            "{} {}",
            event_type.handler_name(),
            if handler.is_some() { "set" } else { "cleared" }
        );
        self.events().set_handler(event_type, handler);
    }

    pub fn event_handler(&self, event_type: XhrEventType) -> Option<EventHandler> {
        self.events().handler(event_type)
    }

    handler_slots! {
        set_onreadystatechange => ReadyStateChange,
        set_onprogress => Progress,
        set_onload => Load,
        set_onerror => Error,
        set_onabort => Abort,
        set_ontimeout => Timeout,
        set_onloadend => LoadEnd,
        set_onloadstart => LoadStart,
    }
}

impl fmt::Debug for XmlHttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("XmlHttpRequest")
            .field("ready_state", &state.ready_state)
            .field("method", &state.method)
            .field("url", &state.url)
            .field("status", &state.status)
            .field("response_type", &state.response_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MockHttpTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn idle_xhr() -> XmlHttpRequest {
        XmlHttpRequest::new(MockHttpTransport::new())
    }

    fn count_events(xhr: &XmlHttpRequest, event_type: XhrEventType) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        xhr.add_event_listener(event_type, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn test_xhr_open() {
        let xhr = idle_xhr();
        let changes = count_events(&xhr, XhrEventType::ReadyStateChange);
        xhr.open("GET", "https://example.com");

        assert_eq!(xhr.ready_state(), XmlHttpRequest::OPENED);
        assert_eq!(xhr.state().url, "https://example.com");
        assert_eq!(xhr.status(), 0);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ready_state_setter_is_idempotent() {
        let xhr = idle_xhr();
        let changes = count_events(&xhr, XhrEventType::ReadyStateChange);

        xhr.set_ready_state(ReadyState::Unsent);
        assert_eq!(changes.load(Ordering::SeqCst), 0);

        xhr.set_ready_state(ReadyState::Loading);
        xhr.set_ready_state(ReadyState::Loading);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_abort_resets_without_abort_event() {
        let xhr = idle_xhr();
        let aborts = count_events(&xhr, XhrEventType::Abort);
        xhr.open("GET", "https://example.com");
        xhr.abort();

        assert_eq!(xhr.ready_state(), XmlHttpRequest::UNSENT);
        assert_eq!(xhr.status(), 0);
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
        assert!(xhr.inner.signal.is_cancelled());
    }

    #[test]
    fn test_request_headers_accumulate() {
        let xhr = idle_xhr();
        xhr.set_request_header("X-Tag", "one");
        xhr.set_request_header("x-tag", "two");

        assert_eq!(xhr.state().request_headers.get("x-tag"), Some("one, two"));
    }

    #[test]
    fn test_accessors_before_send() {
        let xhr = idle_xhr();
        xhr.open("GET", "https://example.com");

        assert_eq!(xhr.response_text().unwrap(), Some(String::new()));
        assert_eq!(xhr.get_all_response_headers(), "");
        assert_eq!(xhr.get_response_header("content-type"), None);
        assert!(xhr.response().is_null());
        assert!(matches!(xhr.response_xml(), Err(XhrError::NotSupported(_))));
    }

    #[test]
    fn test_property_defaults() {
        let xhr = idle_xhr();
        assert_eq!(xhr.response_type(), ResponseType::Default);
        assert_eq!(xhr.timeout(), Duration::ZERO);
        assert!(!xhr.with_credentials());
        assert!(!xhr.stream_request_bad_for_performance());
        assert_eq!(xhr.response_url(), "");
        assert_eq!(xhr.status_text(), "");
    }

    #[test]
    fn test_handler_slot_set_and_clear() {
        let xhr = idle_xhr();
        xhr.set_onload(|_| {});
        assert!(xhr.event_handler(XhrEventType::Load).is_some());

        xhr.set_event_handler(XhrEventType::Load, None);
        assert!(xhr.event_handler(XhrEventType::Load).is_none());
    }

    #[test]
    fn test_upload_listener_is_ignored() {
        let xhr = idle_xhr();
        xhr.upload().add_event_listener(XhrEventType::Progress, |_| panic!("never called"));
        xhr.dispatch(XhrEvent::progress(1));
    }

    #[test]
    fn test_handler_can_reenter_request() {
        let xhr = idle_xhr();
        let reader = xhr.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        xhr.set_onreadystatechange(move |_| {
            seen_clone.lock().unwrap().push(reader.ready_state());
        });

        xhr.open("GET", "https://example.com");
        xhr.abort();

        assert_eq!(*seen.lock().unwrap(), vec![ReadyState::Opened, ReadyState::Unsent]);
    }
}
