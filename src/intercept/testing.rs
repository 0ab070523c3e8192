//! Writer and upstream doubles for unit tests.

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, StatusCode};
use futures_util::future::BoxFuture;
use hyper::upgrade::OnUpgrade;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::intercept::error::{SinkError, UpstreamError};
use crate::intercept::sink::{CapturedResponse, Flusher, Hijacker, ResponseWriter};
use crate::intercept::upstream::Upstream;

/// A transport with neither hijack nor flush support.
#[derive(Default)]
pub struct PlainWriter {
    pub response: CapturedResponse,
}

impl ResponseWriter for PlainWriter {
    fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.set_header(name, value);
    }

    fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.add_header(name, value);
    }

    fn write_status(&mut self, status: StatusCode) {
        self.response.write_status(status);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.response.write_body(chunk);
    }
}

/// A transport that can be hijacked; counts hijacks.
#[derive(Default)]
pub struct HijackableWriter {
    pub response: PlainWriter,
    pub hijacks: usize,
}

impl ResponseWriter for HijackableWriter {
    fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.set_header(name, value);
    }

    fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.add_header(name, value);
    }

    fn write_status(&mut self, status: StatusCode) {
        self.response.write_status(status);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.response.write_body(chunk);
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        Some(self)
    }
}

impl Hijacker for HijackableWriter {
    fn hijack(&mut self) -> Result<OnUpgrade, SinkError> {
        self.hijacks += 1;
        Ok(hyper::upgrade::on(&mut Request::new(())))
    }
}

/// A transport that can be flushed; counts flushes.
#[derive(Default)]
pub struct FlushableWriter {
    pub response: PlainWriter,
    pub flushes: usize,
}

impl ResponseWriter for FlushableWriter {
    fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.set_header(name, value);
    }

    fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.add_header(name, value);
    }

    fn write_status(&mut self, status: StatusCode) {
        self.response.write_status(status);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.response.write_body(chunk);
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }
}

impl Flusher for FlushableWriter {
    fn flush(&mut self) {
        self.flushes += 1;
    }
}

/// Upstream that replays a fixed response and counts invocations.
pub struct StaticUpstream {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Vec<u8>,
    pub calls: Arc<AtomicUsize>,
}

impl StaticUpstream {
    pub fn new(status: u16, headers: &[(&'static str, &'static str)], body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            headers: headers.to_vec(),
            body: body.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Upstream for StaticUpstream {
    fn serve<'a>(
        &'a self,
        _request: Request<Body>,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for &(name, value) in &self.headers {
                writer.add_header(
                    HeaderName::from_bytes(name.as_bytes()).unwrap(),
                    HeaderValue::from_str(value).unwrap(),
                );
            }
            writer.write_status(self.status);
            writer.write_body(&self.body);
            Ok(())
        })
    }
}

/// Upstream that always fails.
pub struct FailingUpstream;

impl Upstream for FailingUpstream {
    fn serve<'a>(
        &'a self,
        _request: Request<Body>,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        Box::pin(async move {
            writer.write_body(b"partial");
            Err(UpstreamError::Other("backend exploded".into()))
        })
    }
}

/// Upstream that takes over the connection, as a protocol switch would.
pub struct HijackingUpstream;

impl Upstream for HijackingUpstream {
    fn serve<'a>(
        &'a self,
        _request: Request<Body>,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        Box::pin(async move {
            crate::intercept::sink::hijack(writer)?;
            writer.write_status(StatusCode::SWITCHING_PROTOCOLS);
            Ok(())
        })
    }
}

/// Build a request with the given method and headers.
pub fn request(method: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}
