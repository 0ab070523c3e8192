//! HTTP body-presence rules and write-back of a processed response.

use axum::http::header::{HeaderValue, CONTENT_LENGTH};
use axum::http::{HeaderMap, Method, StatusCode};

use crate::intercept::sink::ResponseWriter;

/// Whether a response to `method` with `status` may carry a body.
///
/// HEAD responses, 1xx, 204 and 304 never do (RFC 9110 §6.4.1, §9.3.2).
pub fn body_permitted(method: &Method, status: StatusCode) -> bool {
    if method == Method::HEAD {
        return false;
    }
    if status.is_informational() {
        return false;
    }
    !matches!(status, StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED)
}

/// Emit a processed response downstream.
///
/// Headers are copied in order, `Content-Length` is recomputed from `body`, and the body
/// is written only when [`body_permitted`] allows it. The length still describes the body
/// a body-bearing response would have had.
///
/// Header names arrive lowercased from `HeaderMap`; the upstream's original casing is not kept.
pub fn write_back(
    writer: &mut dyn ResponseWriter,
    method: &Method,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) {
    for (name, value) in headers {
        writer.add_header(name.clone(), value.clone());
    }
    writer.set_header(CONTENT_LENGTH, HeaderValue::from(body.len()));
    writer.write_status(status);

    if body_permitted(method, status) {
        writer.write_body(body);
    } else {
        tracing::trace!(method = %method, status = %status, suppressed = body.len(), "Response body suppressed");
    }
}
