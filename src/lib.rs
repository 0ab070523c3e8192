//! Reverse proxy that rewrites upstream responses on the way back.
//!
//! HTML pages get a configured script injected before `</body>`; JavaScript bundles get a
//! source URL replaced with a target URL. Protocol upgrades pass through untouched.

pub mod config;
pub mod http;
pub mod intercept;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::{HttpServer, Pipeline};
pub use intercept::{Interceptor, ResponseWriter, Rewriter, Upstream};
pub use lifecycle::Shutdown;
