//! The next stage of the request pipeline.

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;

use crate::intercept::error::UpstreamError;
use crate::intercept::sink::ResponseWriter;

/// Produces a response for `request` into `writer`.
///
/// Implementations must be shareable across concurrent requests; the writer is owned by a
/// single request and never escapes it.
pub trait Upstream: Send + Sync {
    fn serve<'a>(
        &'a self,
        request: Request<Body>,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, Result<(), UpstreamError>>;
}
