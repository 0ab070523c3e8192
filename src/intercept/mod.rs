//! Response interception subsystem.
//!
//! # Data Flow
//! ```text
//! request
//!     → upgrade.rs (protocol upgrade? hand the real writer straight to upstream)
//!     → sink.rs (CapturingSink records status/headers/body from upstream)
//!     → rewrite.rs (encoding gate, content-type match, inject or rewrite)
//!     → semantics.rs (body-presence rules, Content-Length, write-back)
//!     → real writer
//! ```
//!
//! # Design Decisions
//! - Whole responses are buffered in memory before rewriting; no size cap is enforced
//! - Fragments are loaded once at provisioning and shared read-only
//! - Upstream failures propagate unchanged and nothing is written back

pub mod error;
pub mod fragment;
pub mod interceptor;
pub mod rewrite;
pub mod semantics;
pub mod sink;
pub mod upgrade;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ConfigurationError, SinkError, UpstreamError};
pub use interceptor::Interceptor;
pub use rewrite::{RewriteDecision, Rewriter};
pub use sink::{CapturedResponse, CapturingSink, ResponseWriter, SinkState};
pub use upgrade::is_upgrade;
pub use upstream::Upstream;
