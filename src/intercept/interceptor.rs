//! One request pass: classify, capture, rewrite, write back.

use axum::body::Body;
use axum::http::header::{CONNECTION, UPGRADE};
use axum::http::Request;
use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::intercept::error::UpstreamError;
use crate::intercept::rewrite::Rewriter;
use crate::intercept::semantics::write_back;
use crate::intercept::sink::{CapturingSink, ResponseWriter};
use crate::intercept::upgrade::is_upgrade;
use crate::intercept::upstream::Upstream;
use crate::observability::metrics;

/// Response-rewriting middleware around a `next` upstream.
///
/// Interceptors are themselves upstreams, so several rewriters can be stacked.
pub struct Interceptor {
    rewriter: Rewriter,
    next: Arc<dyn Upstream>,
}

impl Interceptor {
    pub fn new(rewriter: Rewriter, next: Arc<dyn Upstream>) -> Self {
        Self { rewriter, next }
    }
}

impl Upstream for Interceptor {
    fn serve<'a>(
        &'a self,
        request: Request<Body>,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        Box::pin(async move {
            if is_upgrade(request.headers()) {
                tracing::debug!(
                    variant = self.rewriter.variant(),
                    upgrade = ?request.headers().get(UPGRADE),
                    connection = ?request.headers().get(CONNECTION),
                    "Bypassing interception for protocol upgrade request"
                );
                metrics::record_upgrade_bypass();
                return self.next.serve(request, writer).await;
            }

            let method = request.method().clone();

            let mut sink = CapturingSink::new(&mut *writer);
            self.next.serve(request, &mut sink).await?;
            let (status, headers, body) = sink.into_captured().into_parts();

            let body = self.rewriter.apply(&headers, body);
            write_back(writer, &method, status, &headers, &body);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::fragment::{FragmentSource, ScriptFragment};
    use crate::intercept::sink::SinkState;
    use crate::intercept::testing::{
        request, FailingUpstream, HijackableWriter, HijackingUpstream, PlainWriter, StaticUpstream,
    };
    use axum::http::header::CONTENT_LENGTH;
    use axum::http::StatusCode;
    use std::sync::atomic::Ordering;

    const SCRIPT: &str = "window.__INJECTED__ = true;";
    const PAGE: &str = "<html><body><h1>hi</h1></body></html>";

    fn injector(next: impl Upstream + 'static) -> Interceptor {
        let rewriter = Rewriter::HtmlInjection(ScriptFragment::new(SCRIPT, FragmentSource::Literal));
        Interceptor::new(rewriter, Arc::new(next))
    }

    fn html(status: u16, body: &str) -> StaticUpstream {
        StaticUpstream::new(status, &[("content-type", "text/html; charset=utf-8")], body)
    }

    fn body_text(writer: &PlainWriter) -> String {
        String::from_utf8(writer.response.body().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_get_html_is_injected() {
        let interceptor = injector(html(200, PAGE));
        let mut real = PlainWriter::default();
        interceptor.serve(request("GET", &[]), &mut real).await.unwrap();

        let body = body_text(&real);
        assert!(body.contains(&format!("<script>\n{}\n</script>\n</body>", SCRIPT)));
        assert_eq!(real.response.status(), StatusCode::OK);
        assert_eq!(real.response.headers()[CONTENT_LENGTH], body.len().to_string().as_str());
    }

    #[tokio::test]
    async fn test_head_request_suppresses_body() {
        let interceptor = injector(html(200, PAGE));
        let mut real = PlainWriter::default();
        interceptor.serve(request("HEAD", &[]), &mut real).await.unwrap();

        let injected_len = PAGE.len() + format!("<script>\n{}\n</script>\n", SCRIPT).len();
        assert!(real.response.body().is_empty());
        assert_eq!(real.response.headers()[CONTENT_LENGTH], injected_len.to_string().as_str());
    }

    #[tokio::test]
    async fn test_not_modified_html_has_no_body() {
        let interceptor = injector(html(304, PAGE));
        let mut real = PlainWriter::default();
        interceptor.serve(request("GET", &[]), &mut real).await.unwrap();

        assert_eq!(real.response.status(), StatusCode::NOT_MODIFIED);
        assert!(real.response.body().is_empty());
    }

    #[tokio::test]
    async fn test_bodyless_statuses() {
        for status in [100, 101, 204, 304] {
            let interceptor = injector(html(status, PAGE));
            let mut real = PlainWriter::default();
            interceptor.serve(request("GET", &[]), &mut real).await.unwrap();
            assert_eq!(real.response.status().as_u16(), status);
            assert!(real.response.body().is_empty(), "status {status}");
        }
    }

    #[tokio::test]
    async fn test_redirect_and_error_statuses_keep_body() {
        for status in [301, 302, 404, 500] {
            let interceptor = injector(html(status, PAGE));
            let mut real = PlainWriter::default();
            interceptor.serve(request("GET", &[]), &mut real).await.unwrap();
            assert_eq!(real.response.status().as_u16(), status);
            assert!(body_text(&real).contains(SCRIPT), "status {status}");
        }
    }

    #[tokio::test]
    async fn test_non_html_passes_through() {
        let script = "console.log('</body>');";
        let upstream = StaticUpstream::new(200, &[("content-type", "application/javascript")], script);
        let interceptor = injector(upstream);
        let mut real = PlainWriter::default();
        interceptor.serve(request("GET", &[]), &mut real).await.unwrap();

        assert_eq!(body_text(&real), script);
        assert_eq!(real.response.headers()[CONTENT_LENGTH], script.len().to_string().as_str());
    }

    #[tokio::test]
    async fn test_empty_body() {
        let interceptor = injector(html(200, ""));
        let mut real = PlainWriter::default();
        interceptor.serve(request("GET", &[]), &mut real).await.unwrap();

        assert!(real.response.body().is_empty());
        assert_eq!(real.response.headers()[CONTENT_LENGTH], "0");
    }

    #[tokio::test]
    async fn test_large_html_body() {
        let mut page = String::from("<html><body>");
        for i in 0..20_000 {
            page.push_str(&format!("<p>paragraph {i}</p>"));
        }
        page.push_str("</body></html>");
        let interceptor = injector(html(200, &page));
        let mut real = PlainWriter::default();
        interceptor.serve(request("GET", &[]), &mut real).await.unwrap();

        let body = body_text(&real);
        assert!(body.ends_with(&format!("<script>\n{}\n</script>\n</body></html>", SCRIPT)));
    }

    #[tokio::test]
    async fn test_upgrade_bypasses_capture() {
        let upstream = html(200, PAGE);
        let calls = upstream.calls.clone();
        let interceptor = injector(upstream);
        let mut real = PlainWriter::default();
        interceptor
            .serve(request("GET", &[("upgrade", "websocket")]), &mut real)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(body_text(&real), PAGE);
        assert!(real.response.headers().get(CONTENT_LENGTH).is_none());
    }

    #[tokio::test]
    async fn test_connection_upgrade_bypasses_capture() {
        let interceptor = injector(html(200, PAGE));
        let mut real = PlainWriter::default();
        interceptor
            .serve(request("GET", &[("connection", "keep-alive, Upgrade")]), &mut real)
            .await
            .unwrap();

        assert_eq!(body_text(&real), PAGE);
    }

    #[tokio::test]
    async fn test_upstream_failure_skips_write_back() {
        let interceptor = injector(FailingUpstream);
        let mut real = PlainWriter::default();
        let result = interceptor.serve(request("GET", &[]), &mut real).await;

        assert!(matches!(result, Err(UpstreamError::Other(_))));
        assert_eq!(real.response.state(), SinkState::Open);
        assert!(real.response.body().is_empty());
    }

    #[tokio::test]
    async fn test_hijack_through_capture_reaches_transport() {
        let interceptor = injector(HijackingUpstream);
        let mut real = HijackableWriter::default();
        interceptor.serve(request("GET", &[]), &mut real).await.unwrap();
        assert_eq!(real.hijacks, 1);
    }

    #[tokio::test]
    async fn test_hijack_on_plain_transport_fails() {
        let interceptor = injector(HijackingUpstream);
        let mut real = PlainWriter::default();
        let result = interceptor.serve(request("GET", &[]), &mut real).await;
        assert!(matches!(result, Err(UpstreamError::Sink(_))));
    }
}
