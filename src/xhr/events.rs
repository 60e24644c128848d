//! Event wiring for the emulated request
//!
//! Two delivery conventions coexist, as in the legacy interface: a single
//! `on<event>` handler slot per event type, and any number of listeners added
//! with [`EventTarget::add_listener`]. A dispatch registers the slot handler as
//! a one-shot listener and then runs every matching listener in registration
//! order.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::utils::XhrError;

/// Event types emitted by an [`XmlHttpRequest`](super::XmlHttpRequest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XhrEventType {
    ReadyStateChange,
    Progress,
    Load,
    Error,
    Abort,
    Timeout,
    LoadEnd,
    LoadStart,
}

impl XhrEventType {
    pub const ALL: [XhrEventType; 8] = [
        Self::ReadyStateChange,
        Self::Progress,
        Self::Load,
        Self::Error,
        Self::Abort,
        Self::Timeout,
        Self::LoadEnd,
        Self::LoadStart,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadyStateChange => "readystatechange",
            Self::Progress => "progress",
            Self::Load => "load",
            Self::Error => "error",
            Self::Abort => "abort",
            Self::Timeout => "timeout",
            Self::LoadEnd => "loadend",
            Self::LoadStart => "loadstart",
        }
    }

    /// Name of the direct handler property, e.g. `onload`
    pub fn handler_name(&self) -> String {
        format!("on{}", self.as_str())
    }
}

impl FromStr for XhrEventType {
    type Err = XhrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| XhrError::NotSupported(format!("event type {s:?}")))
    }
}

impl fmt::Display for XhrEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XhrEvent {
    pub event_type: XhrEventType,
    /// Bytes received so far; only set on `progress`
    pub loaded: u64,
    pub timestamp: u64,
}

impl XhrEvent {
    /// Create a new event
    pub fn new(event_type: XhrEventType) -> Self {
        Self {
            event_type,
            loaded: 0,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        }
    }

    /// Create a progress event
    pub fn progress(loaded: u64) -> Self {
        Self {
            loaded,
            ..Self::new(XhrEventType::Progress)
        }
    }
}

/// Event handler callback type
pub type EventHandler = Arc<dyn Fn(&XhrEvent) + Send + Sync>;

/// Handle returned by [`EventTarget::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event listener registration
struct EventListener {
    id: ListenerId,
    event_type: XhrEventType,
    handler: EventHandler,
    once: bool,
}

/// Listener lists and handler slots of one request
#[derive(Default)]
pub struct EventTarget {
    listeners: Vec<EventListener>,
    handlers: HashMap<XhrEventType, EventHandler>,
    next_id: u64,
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener; `once` listeners are dropped after their first call
    pub fn add_listener(&mut self, event_type: XhrEventType, handler: EventHandler, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(EventListener {
            id,
            event_type,
            handler,
            once,
        });
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Fill or clear the `on<event>` slot
    pub fn set_handler(&mut self, event_type: XhrEventType, handler: Option<EventHandler>) {
        match handler {
            Some(handler) => {
                self.handlers.insert(event_type, handler);
            }
            None => {
                self.handlers.remove(&event_type);
            }
        }
    }

    pub fn handler(&self, event_type: XhrEventType) -> Option<EventHandler> {
        self.handlers.get(&event_type).cloned()
    }

    /// Handlers due for one dispatch, in call order
    ///
    /// The slot handler is wrapped as a one-shot listener first. One-shot
    /// listeners are unregistered here, before any handler runs, so the caller
    /// can invoke the returned handlers without holding a borrow on `self`.
    pub fn take_due(&mut self, event_type: XhrEventType) -> Vec<EventHandler> {
        if let Some(handler) = self.handler(event_type) {
            self.add_listener(event_type, handler, true);
        }

        let mut due = Vec::new();
        self.listeners.retain(|l| {
            if l.event_type != event_type {
                return true;
            }
            due.push(Arc::clone(&l.handler));
            !l.once
        });
        due
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("listeners", &self.listeners.len())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, EventHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let handler: EventHandler = Arc::new(move |_: &XhrEvent| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    fn fire(target: &mut EventTarget, event: XhrEvent) {
        for handler in target.take_due(event.event_type) {
            handler(&event);
        }
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(XhrEventType::ReadyStateChange.as_str(), "readystatechange");
        assert_eq!(XhrEventType::LoadEnd.handler_name(), "onloadend");
        assert_eq!("timeout".parse::<XhrEventType>().unwrap(), XhrEventType::Timeout);
        assert!("click".parse::<XhrEventType>().is_err());
    }

    #[test]
    fn test_progress_event() {
        let event = XhrEvent::progress(42);
        assert_eq!(event.event_type, XhrEventType::Progress);
        assert_eq!(event.loaded, 42);
    }

    #[test]
    fn test_listener_dispatch() {
        let mut target = EventTarget::new();
        let (count, handler) = counter();
        target.add_listener(XhrEventType::Load, handler, false);

        fire(&mut target, XhrEvent::new(XhrEventType::Load));
        fire(&mut target, XhrEvent::new(XhrEventType::Load));
        fire(&mut target, XhrEvent::new(XhrEventType::Error));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_once_listener() {
        let mut target = EventTarget::new();
        let (count, handler) = counter();
        target.add_listener(XhrEventType::Load, handler, true);

        fire(&mut target, XhrEvent::new(XhrEventType::Load));
        fire(&mut target, XhrEvent::new(XhrEventType::Load));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(target.take_due(XhrEventType::Load).is_empty());
    }

    #[test]
    fn test_slot_handler_fires_once_per_dispatch() {
        let mut target = EventTarget::new();
        let (count, handler) = counter();
        target.set_handler(XhrEventType::Progress, Some(handler));

        for _ in 0..3 {
            fire(&mut target, XhrEvent::progress(1));
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);

        target.set_handler(XhrEventType::Progress, None);
        fire(&mut target, XhrEvent::progress(1));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_slot_handler_runs_after_listeners() {
        let mut target = EventTarget::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        let onload: EventHandler = Arc::new(move |_: &XhrEvent| o.lock().unwrap().push("onload"));
        let o = Arc::clone(&order);
        let listener: EventHandler = Arc::new(move |_: &XhrEvent| o.lock().unwrap().push("listener"));

        target.set_handler(XhrEventType::Load, Some(onload));
        target.add_listener(XhrEventType::Load, listener, false);

        fire(&mut target, XhrEvent::new(XhrEventType::Load));
        assert_eq!(*order.lock().unwrap(), vec!["listener", "onload"]);
    }

    #[test]
    fn test_remove_listener() {
        let mut target = EventTarget::new();
        let (count, handler) = counter();
        let id = target.add_listener(XhrEventType::Abort, handler, false);

        assert!(target.remove_listener(id));
        assert!(!target.remove_listener(id));
        fire(&mut target, XhrEvent::new(XhrEventType::Abort));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
