//! Assembly of the interceptor chain from configuration.
//!
//! # Data Flow
//! ```text
//! ProxyConfig
//!     → BackendUpstream (innermost)
//!     → Interceptor(UrlRewrite)      if url_rewrite.enabled
//!     → Interceptor(HtmlInjection)   if injection.enabled (outermost)
//! ```
//!
//! # Design Decisions
//! - Fragments and target URLs are provisioned here, once per pipeline
//! - A reload builds a complete new pipeline; requests in flight keep the old one

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::http::forward::BackendUpstream;
use crate::intercept::error::{ConfigurationError, UpstreamError};
use crate::intercept::interceptor::Interceptor;
use crate::intercept::rewrite::Rewriter;
use crate::intercept::sink::ResponseWriter;
use crate::intercept::upstream::Upstream;

/// A provisioned chain of interceptors ending at the backend.
pub struct Pipeline {
    root: Arc<dyn Upstream>,
    rewriters: Vec<&'static str>,
}

impl Pipeline {
    /// Provision a pipeline that forwards to the configured backend.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigurationError> {
        let backend = BackendUpstream::new(&config.upstream, &config.timeouts)?;
        Self::with_upstream(config, Arc::new(backend))
    }

    /// Provision the configured rewriters around an arbitrary upstream.
    pub fn with_upstream(
        config: &ProxyConfig,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Self, ConfigurationError> {
        let mut root = upstream;
        let mut rewriters = Vec::new();

        if config.url_rewrite.enabled {
            let rewriter = Rewriter::url_rewrite(&config.url_rewrite)?;
            rewriters.push(rewriter.variant());
            root = Arc::new(Interceptor::new(rewriter, root));
        }

        if config.injection.enabled {
            let rewriter = Rewriter::html_injection(&config.injection)?;
            rewriters.push(rewriter.variant());
            root = Arc::new(Interceptor::new(rewriter, root));
        }

        tracing::info!(
            upstream = %config.upstream.address,
            rewriters = ?rewriters,
            "Pipeline provisioned"
        );

        Ok(Self { root, rewriters })
    }

    /// Variants in the chain, innermost first.
    pub fn rewriters(&self) -> &[&'static str] {
        &self.rewriters
    }
}

impl Upstream for Pipeline {
    fn serve<'a>(
        &'a self,
        request: Request<Body>,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        self.root.serve(request, writer)
    }
}
