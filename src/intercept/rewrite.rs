//! Body rewriting for buffered responses.
//!
//! # Responsibilities
//! - Gate rewriting on `Content-Encoding` (encoded bodies are opaque bytes)
//! - Match `Content-Type` by case-folded substring
//! - Inject a script before the first `</body>` of HTML bodies
//! - Replace a literal URL everywhere in JavaScript bodies
//!
//! # Design Decisions
//! - Content-type matching is substring containment, not media-type parsing:
//!   `application/xhtml+xml` does not contain `text/html` and is left alone
//! - A missing `</body>` or zero URL matches returns the body untouched
//! - Matching is byte-oriented, so non-UTF-8 bodies pass through safely

use axum::http::header::{HeaderMap, CONTENT_ENCODING, CONTENT_TYPE};

use crate::config::schema::{InjectionConfig, UrlRewriteConfig};
use crate::intercept::error::ConfigurationError;
use crate::intercept::fragment::{ScriptFragment, TargetUrl};
use crate::observability::metrics;

const BODY_CLOSE_TAG: &[u8] = b"</body>";

/// Outcome of the applicability check for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteDecision {
    /// `Content-Encoding` is set; the body is left alone.
    SkipEncoded,
    /// `Content-Type` does not match the rewriter.
    SkipContentType,
    InjectHtml,
    RewriteUrls,
}

impl RewriteDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewriteDecision::SkipEncoded => "skip_encoded",
            RewriteDecision::SkipContentType => "skip_content_type",
            RewriteDecision::InjectHtml => "inject_html",
            RewriteDecision::RewriteUrls => "rewrite_urls",
        }
    }
}

/// A body transformation, configured once at setup.
#[derive(Debug, Clone)]
pub enum Rewriter {
    /// Insert a script before `</body>` in `text/html` responses.
    HtmlInjection(ScriptFragment),
    /// Replace every occurrence of `source` with `target` in JavaScript responses.
    UrlRewrite { source: String, target: TargetUrl },
}

impl Rewriter {
    pub fn html_injection(config: &InjectionConfig) -> Result<Self, ConfigurationError> {
        Ok(Rewriter::HtmlInjection(ScriptFragment::provision(config)?))
    }

    pub fn url_rewrite(config: &UrlRewriteConfig) -> Result<Self, ConfigurationError> {
        let target = TargetUrl::resolve(config)?;
        tracing::info!(source_url = %config.source_url, target_url = %target.as_str(), "URL rewrite provisioned");
        Ok(Rewriter::UrlRewrite {
            source: config.source_url.clone(),
            target,
        })
    }

    /// Label used in logs and metrics.
    pub fn variant(&self) -> &'static str {
        match self {
            Rewriter::HtmlInjection(_) => "html_injection",
            Rewriter::UrlRewrite { .. } => "url_rewrite",
        }
    }

    /// Decide from response headers alone whether this rewriter applies.
    pub fn decide(&self, headers: &HeaderMap) -> RewriteDecision {
        if is_encoded(headers) {
            return RewriteDecision::SkipEncoded;
        }
        match self {
            Rewriter::HtmlInjection(_) if content_type_contains(headers, "text/html") => {
                RewriteDecision::InjectHtml
            }
            Rewriter::UrlRewrite { .. } if content_type_contains(headers, "javascript") => {
                RewriteDecision::RewriteUrls
            }
            _ => RewriteDecision::SkipContentType,
        }
    }

    /// Produce the body to send for a response with `headers`.
    pub fn apply(&self, headers: &HeaderMap, body: Vec<u8>) -> Vec<u8> {
        let decision = self.decide(headers);
        metrics::record_rewrite_decision(self.variant(), decision.as_str());

        match (self, decision) {
            (Rewriter::HtmlInjection(fragment), RewriteDecision::InjectHtml) => {
                if fragment.is_empty() {
                    tracing::warn!("No cached script available, skipping injection");
                    return body;
                }
                match inject_before_body_close(&body, fragment.wrapped().as_bytes()) {
                    Some(injected) => {
                        tracing::debug!(added = injected.len() - body.len(), "Injected script into HTML");
                        injected
                    }
                    None => {
                        tracing::debug!("No </body> tag found, skipping injection");
                        body
                    }
                }
            }
            (Rewriter::UrlRewrite { source, target }, RewriteDecision::RewriteUrls) => {
                let (rewritten, count) =
                    replace_all(&body, source.as_bytes(), target.as_str().as_bytes());
                metrics::record_url_replacements(count);
                if count == 0 {
                    return body;
                }
                tracing::debug!(replacements = count, source_url = %source, "Rewrote URLs in JavaScript");
                rewritten
            }
            (_, decision) => {
                tracing::trace!(variant = self.variant(), decision = decision.as_str(), "Body left unmodified");
                body
            }
        }
    }
}

/// True if the response carries a non-empty `Content-Encoding`.
pub fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .map(|v| !v.as_bytes().is_empty())
        .unwrap_or(false)
}

/// Case-insensitive substring test against the first `Content-Type` value.
pub fn content_type_contains(headers: &HeaderMap, needle: &str) -> bool {
    headers
        .get(CONTENT_TYPE)
        .map(|v| {
            String::from_utf8_lossy(v.as_bytes())
                .to_ascii_lowercase()
                .contains(needle)
        })
        .unwrap_or(false)
}

/// Insert `fragment` immediately before the first case-insensitive `</body>`.
///
/// Returns `None` when the tag is absent. The tag keeps its original casing.
pub fn inject_before_body_close(html: &[u8], fragment: &[u8]) -> Option<Vec<u8>> {
    let index = html
        .windows(BODY_CLOSE_TAG.len())
        .position(|window| window.eq_ignore_ascii_case(BODY_CLOSE_TAG))?;

    let mut out = Vec::with_capacity(html.len() + fragment.len());
    out.extend_from_slice(&html[..index]);
    out.extend_from_slice(fragment);
    out.extend_from_slice(&html[index..]);
    Some(out)
}

/// Replace every non-overlapping occurrence of `from`, scanning left to right.
///
/// Returns the new body and the number of replacements.
pub fn replace_all(body: &[u8], from: &[u8], to: &[u8]) -> (Vec<u8>, usize) {
    if from.is_empty() || body.len() < from.len() {
        return (body.to_vec(), 0);
    }

    let mut out = Vec::with_capacity(body.len());
    let mut count = 0;
    let mut start = 0;
    while let Some(offset) = find(&body[start..], from) {
        out.extend_from_slice(&body[start..start + offset]);
        out.extend_from_slice(to);
        start += offset + from.len();
        count += 1;
    }
    out.extend_from_slice(&body[start..]);
    (out, count)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
