//! Response writer contract and the capturing sink.
//!
//! # Responsibilities
//! - Define the minimal writer contract the upstream handler writes into
//! - Model status/header finalization as an explicit two-state machine
//! - Record an upstream response instead of transmitting it
//! - Delegate hijack/flush to the real transport, probing capabilities at call time
//!
//! # Design Decisions
//! - Capabilities are probed through `as_hijacker` / `as_flusher`, never by concrete type
//! - Hijack without support is an error; flush without support is a silent no-op
//! - Writes after finalization are ignored, mirroring first-write-wins HTTP writers

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use hyper::upgrade::OnUpgrade;

use crate::intercept::error::SinkError;

/// Connection takeover capability.
pub trait Hijacker {
    /// Hand over the raw connection. Resolves once the protocol switch completes.
    fn hijack(&mut self) -> Result<OnUpgrade, SinkError>;
}

/// Explicit flush capability.
pub trait Flusher {
    fn flush(&mut self);
}

/// The writer contract an upstream handler produces its response into.
pub trait ResponseWriter: Send {
    /// Headers recorded so far.
    fn headers(&self) -> &HeaderMap;

    /// Replace all values of `name` with `value`.
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Append `value` to the values of `name`, keeping duplicates.
    fn add_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Set the status code. Only the first call has an effect.
    fn write_status(&mut self, status: StatusCode);

    /// Append body bytes, finalizing the status as 200 if none was written.
    fn write_body(&mut self, chunk: &[u8]);

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        None
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }
}

/// Take over the connection behind `writer`, failing if the transport cannot.
pub fn hijack(writer: &mut dyn ResponseWriter) -> Result<OnUpgrade, SinkError> {
    match writer.as_hijacker() {
        Some(hijacker) => hijacker.hijack(),
        None => Err(SinkError::CapabilityUnsupported("hijacking")),
    }
}

/// Flush `writer` if its transport supports it.
pub fn flush(writer: &mut dyn ResponseWriter) {
    if let Some(flusher) = writer.as_flusher() {
        flusher.flush();
    }
}

/// Finalization state of a recorded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Status and headers may still change.
    Open,
    /// Status is fixed; header and status writes are ignored.
    Finalized,
}

/// A response recorded in memory: status, header multimap and body accumulator.
#[derive(Debug)]
pub struct CapturedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    state: SinkState,
}

impl CapturedResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            state: SinkState::Open,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        match self.state {
            SinkState::Open => {
                self.headers.insert(name, value);
            }
            SinkState::Finalized => {
                tracing::trace!(header = %name, "Ignoring header write after finalization");
            }
        }
    }

    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        match self.state {
            SinkState::Open => {
                self.headers.append(name, value);
            }
            SinkState::Finalized => {
                tracing::trace!(header = %name, "Ignoring header write after finalization");
            }
        }
    }

    pub fn write_status(&mut self, status: StatusCode) {
        if self.state == SinkState::Open {
            self.status = status;
            self.state = SinkState::Finalized;
        }
    }

    pub fn write_body(&mut self, chunk: &[u8]) {
        if self.state == SinkState::Open {
            self.write_status(StatusCode::OK);
        }
        self.body.extend_from_slice(chunk);
    }

    /// Split into status, headers and body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}

impl Default for CapturedResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Stands in for the real writer while the upstream handler runs.
///
/// Everything written is recorded into a [`CapturedResponse`]. Hijack and flush reach the
/// wrapped transport directly.
pub struct CapturingSink<'w> {
    inner: &'w mut dyn ResponseWriter,
    captured: CapturedResponse,
}

impl<'w> CapturingSink<'w> {
    pub fn new(inner: &'w mut dyn ResponseWriter) -> Self {
        Self {
            inner,
            captured: CapturedResponse::new(),
        }
    }

    pub fn captured(&self) -> &CapturedResponse {
        &self.captured
    }

    /// Release the wrapped writer and return what was recorded.
    pub fn into_captured(self) -> CapturedResponse {
        self.captured
    }
}

impl ResponseWriter for CapturingSink<'_> {
    fn headers(&self) -> &HeaderMap {
        self.captured.headers()
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.captured.set_header(name, value);
    }

    fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.captured.add_header(name, value);
    }

    fn write_status(&mut self, status: StatusCode) {
        self.captured.write_status(status);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.captured.write_body(chunk);
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        Some(self)
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }
}

impl Hijacker for CapturingSink<'_> {
    fn hijack(&mut self) -> Result<OnUpgrade, SinkError> {
        hijack(&mut *self.inner)
    }
}

impl Flusher for CapturingSink<'_> {
    fn flush(&mut self) {
        flush(&mut *self.inner);
    }
}
