//! The downstream response writer and header hygiene.
//!
//! # Responsibilities
//! - Implement the writer contract on top of an axum `Response`
//! - Hand the client connection over on hijack when hyper offers an upgrade
//! - Strip hop-by-hop headers so framing is recomputed by the server
//!
//! # Design Decisions
//! - The axum response is built once the pipeline finishes; there is no flush capability
//! - Hijacking is only possible for HTTP/1.1 requests that asked for an upgrade

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};
use axum::http::StatusCode;
use axum::response::Response;
use hyper::upgrade::OnUpgrade;

use crate::intercept::error::SinkError;
use crate::intercept::sink::{CapturedResponse, Hijacker, ResponseWriter};

/// Headers that describe a single connection rather than the message.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Writer for the real client connection.
pub struct HttpResponseWriter {
    response: CapturedResponse,
    on_upgrade: Option<OnUpgrade>,
    hijacked: bool,
}

impl HttpResponseWriter {
    /// `on_upgrade` is the hyper upgrade handle taken from the request extensions, if any.
    pub fn new(on_upgrade: Option<OnUpgrade>) -> Self {
        Self {
            response: CapturedResponse::new(),
            on_upgrade,
            hijacked: false,
        }
    }

    pub fn into_response(self) -> Response {
        let (status, headers, body) = self.response.into_parts();
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl ResponseWriter for HttpResponseWriter {
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
        if self.on_upgrade.is_some() || self.hijacked {
            Some(self)
        } else {
            None
        }
    }
}

impl Hijacker for HttpResponseWriter {
    fn hijack(&mut self) -> Result<OnUpgrade, SinkError> {
        match self.on_upgrade.take() {
            Some(on_upgrade) => {
                self.hijacked = true;
                Ok(on_upgrade)
            }
            None if self.hijacked => Err(SinkError::AlreadyHijacked),
            None => Err(SinkError::CapabilityUnsupported("hijacking")),
        }
    }
}
