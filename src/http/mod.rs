//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, limits)
//!     → pipeline.rs (current interceptor chain)
//!     → forward.rs (hyper client to the backend, upgrade tunnel)
//!     → response.rs (writer backing the client response)
//!     → Send to client
//! ```

pub mod forward;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use forward::BackendUpstream;
pub use pipeline::Pipeline;
pub use request::{request_id, UuidRequestId, X_REQUEST_ID};
pub use response::{strip_hop_by_hop, HttpResponseWriter};
pub use server::HttpServer;
