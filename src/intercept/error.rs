//! Error types for the interception core.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by response writers when a low-level capability is requested.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The underlying transport does not expose the requested capability.
    #[error("underlying response writer does not support {0}")]
    CapabilityUnsupported(&'static str),

    /// The connection was already handed over by an earlier hijack.
    #[error("connection has already been hijacked")]
    AlreadyHijacked,
}

/// Failure of the upstream handler. Propagated unchanged through interceptors.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request to the backend could not be completed.
    #[error("upstream request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    /// The backend response body could not be read.
    #[error("failed to read upstream body: {0}")]
    Body(#[from] axum::Error),

    /// A writer capability required by the upstream was unavailable.
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Other(#[from] axum::BoxError),
}

/// Fatal setup-time errors. A middleware instance that fails to provision never serves.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to read injection script from {}: {source}", path.display())]
    ScriptUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no rewrite target URL configured and environment variable {env} is not set")]
    MissingTargetUrl { env: String },

    #[error("invalid rewrite target URL {url:?}: {source}")]
    InvalidTargetUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid upstream address {0:?}")]
    InvalidUpstream(String),
}
