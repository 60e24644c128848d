//! # xhr-shim - XMLHttpRequest over a streaming transport
//!
//! Lets code written against the legacy XMLHttpRequest contract run on top of
//! a modern async HTTP transport, including incremental delivery of
//! newline-delimited JSON bodies.
//!
//! ## Architecture
//!
//! - **xhr**: the emulated request (state machine, header store, event wiring,
//!   transport bridge, body consumption)
//! - **network**: the transport seam and its reqwest-backed default
//! - **utils**: shared error types

pub mod network;
pub mod utils;
pub mod xhr;

// Re-export main types for convenience
pub use network::{HttpTransport, NetworkClient, NetworkConfig};
pub use utils::error::{Result, TransportError, XhrError};
pub use xhr::{
    ReadyState, ResponseType, XhrEvent, XhrEventType, XhrOutcome, XhrResponse, XmlHttpRequest,
};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "xhr-shim";
