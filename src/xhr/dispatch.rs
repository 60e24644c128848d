//! Dispatch & transport bridge
//!
//! `send` turns the configured request into exactly one transport call, feeds
//! the body through the consumption strategy and folds whatever happens into a
//! single terminal event. Terminal order is fixed:
//!
//! `load | error | abort | timeout`, then `loadend`, then `loadstart`.
//!
//! `loadstart` firing last is part of the emulated contract.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::body::{ConsumptionMode, Decoder, XhrResponse};
use super::events::{XhrEvent, XhrEventType};
use super::state::{ReadyState, ResponseType};
use super::XmlHttpRequest;
use crate::network::{BodyStream, CredentialsMode, Method, Request};
use crate::utils::{Result, TransportError, XhrError};

/// Client identity sent with every request
pub const USER_AGENT: &str = concat!("xhr-shim/", env!("CARGO_PKG_VERSION"));
pub const ORIGIN: &str = "https://xhr-shim.local";
pub const REFERER: &str = "https://xhr-shim.local/";

/// How a `send` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XhrOutcome {
    Load,
    Error,
    Abort,
    Timeout,
}

impl XhrOutcome {
    /// Terminal event announcing this outcome
    pub fn event_type(self) -> XhrEventType {
        match self {
            Self::Load => XhrEventType::Load,
            Self::Error => XhrEventType::Error,
            Self::Abort => XhrEventType::Abort,
            Self::Timeout => XhrEventType::Timeout,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Load
    }
}

impl XmlHttpRequest {
    /// Send the request
    ///
    /// Resolves once the terminal events have been dispatched. Failures never
    /// escape; they are reported through events and the returned outcome.
    /// Calling `send` again before the previous call resolves is a caller
    /// error.
    pub async fn send(&self, body: Option<Bytes>) -> XhrOutcome {
        let result = match self.prepare(body) {
            Ok(request) => self.exchange(request).await,
            Err(err) => Err(err),
        };

        let outcome = self.settle(result);
        self.dispatch(XhrEvent::new(XhrEventType::LoadEnd));
        self.clear_timer();
        self.dispatch(XhrEvent::new(XhrEventType::LoadStart));
        outcome
    }

    /// Arm the timeout, stamp the client identity and assemble the request
    fn prepare(&self, body: Option<Bytes>) -> Result<Request> {
        let mut state = self.state();

        if let Some(stale) = state.timer.take() {
            stale.abort();
        }
        state.generation += 1;
        state.settled = false;
        if !state.timeout.is_zero() {
            let timeout = state.timeout;
            let generation = state.generation;
            let this = self.clone();
            state.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                let mut state = this.state();
                if state.settled || state.generation != generation {
                    return;
                }
                log::debug!("request timed out after {:?}", timeout);
                state.timed_out = true;
                this.inner.signal.cancel();
            }));
        }

        state.request_headers.force("user-agent", USER_AGENT);
        state.request_headers.force("origin", ORIGIN);
        state.request_headers.force("referer", REFERER);

        state.is_response_text = state.response_type.resolve() == ResponseType::Text;

        let method = if state.method.is_empty() {
            Method::Get
        } else {
            Method::parse(&state.method)
        };
        let mut request = Request::new(method, &state.url)?
            .credentials(CredentialsMode::from_with_credentials(state.with_credentials));
        for (name, value) in state.request_headers.iter() {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        Ok(request)
    }

    /// Transport call plus body consumption
    async fn exchange(&self, request: Request) -> Result<()> {
        let signal = self.inner.signal.clone();
        log::debug!("{} {}", request.method().as_str(), request.url());

        let response = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(TransportError::Aborted.into()),
            response = self.inner.transport.fetch(request, signal.clone()) => response?,
        };
        let (head, mut body) = response.into_parts();
        log::debug!("{} {} from {}", head.status, head.status_text, head.url);

        // `abort` cancels under the state lock, so checking here decides
        // atomically whether the head may still land.
        let mode = {
            let mut state = self.state();
            if signal.is_cancelled() {
                return Err(TransportError::Aborted.into());
            }
            state.response_url = head.url;
            state.status = head.status;
            state.status_text = head.status_text;
            state.response_headers = head.headers;
            ConsumptionMode::select(
                state.response_headers.get("content-type"),
                state.stream_request_bad_for_performance,
            )
        };
        self.advance(ReadyState::HeadersReceived)?;

        match mode {
            ConsumptionMode::Buffered => self.consume_buffered(&mut body, &signal).await,
            ConsumptionMode::Incremental => self.consume_incremental(&mut body, &signal).await,
        }
    }

    fn decoder(&self) -> Decoder {
        let state = self.state();
        Decoder::new(
            state.response_type,
            &state.mime_override,
            state.response_headers.get("content-type"),
        )
    }

    async fn consume_buffered(&self, body: &mut BodyStream, signal: &CancellationToken) -> Result<()> {
        let mut bytes = BytesMut::new();
        while let Some(chunk) = next_chunk(body, signal).await? {
            bytes.extend_from_slice(&chunk);
        }
        let response = self.decoder().decode(&bytes)?;
        self.store_response(response, signal)
    }

    /// Move readyState forward unless the exchange was aborted meanwhile
    fn advance(&self, value: ReadyState) -> Result<()> {
        let previous = {
            let mut state = self.state();
            if self.inner.signal.is_cancelled() {
                return Err(TransportError::Aborted.into());
            }
            if state.ready_state == value {
                return Ok(());
            }
            std::mem::replace(&mut state.ready_state, value)
        };
        log::trace!("readyState {:?} -> {:?}", previous, value);
        self.dispatch(XhrEvent::new(XhrEventType::ReadyStateChange));
        Ok(())
    }

    fn store_response(&self, response: XhrResponse, signal: &CancellationToken) -> Result<()> {
        let mut state = self.state();
        if signal.is_cancelled() {
            return Err(TransportError::Aborted.into());
        }
        state.response = response;
        Ok(())
    }

    /// Re-decode everything received so far after each chunk
    ///
    /// A chunk that leaves the accumulation undecodable (half a JSON document)
    /// keeps the previous `response`; only a failure on the final
    /// accumulation fails the exchange.
    async fn consume_incremental(&self, body: &mut BodyStream, signal: &CancellationToken) -> Result<()> {
        let decoder = self.decoder();
        let mut bytes = BytesMut::new();
        let mut pending_error = None;

        while let Some(chunk) = next_chunk(body, signal).await? {
            self.advance(ReadyState::Loading)?;
            bytes.extend_from_slice(&chunk);

            match decoder.decode(&bytes) {
                Ok(response) => {
                    self.store_response(response, signal)?;
                    pending_error = None;
                }
                Err(err) => {
                    log::trace!("partial body not decodable yet ({} bytes): {}", bytes.len(), err);
                    pending_error = Some(err);
                }
            }
            self.dispatch(XhrEvent::progress(bytes.len() as u64));
        }

        match pending_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Map the exchange result onto a terminal event
    ///
    /// Marking the send settled under the state lock keeps a late timer from
    /// cancelling an exchange that already has its outcome. A timer that
    /// fired first wins, whatever the exchange result.
    fn settle(&self, result: Result<()>) -> XhrOutcome {
        let outcome = {
            let mut state = self.state();
            state.settled = true;
            match result {
                _ if state.timed_out => XhrOutcome::Timeout,
                Ok(()) => XhrOutcome::Load,
                Err(err) if err.is_abort() => XhrOutcome::Abort,
                Err(err) => {
                    log::warn!("request failed: {}", err);
                    state.errored = true;
                    XhrOutcome::Error
                }
            }
        };
        log::debug!("exchange finished: {:?}", outcome);

        self.set_ready_state(ReadyState::Done);
        self.dispatch(XhrEvent::new(outcome.event_type()));
        outcome
    }

    fn clear_timer(&self) {
        if let Some(timer) = self.state().timer.take() {
            timer.abort();
        }
    }
}

/// Next body chunk, or `Aborted` once the signal fires
async fn next_chunk(body: &mut BodyStream, signal: &CancellationToken) -> Result<Option<Bytes>> {
    tokio::select! {
        biased;
        _ = signal.cancelled() => Err(TransportError::Aborted.into()),
        chunk = body.next() => chunk.transpose().map_err(XhrError::from),
    }
}
