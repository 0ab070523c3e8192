//! Forwarding to the upstream server.
//!
//! # Responsibilities
//! - Rewrite the request URI to the configured upstream authority
//! - Send the request over a pooled hyper client and write the response into the writer
//! - Tunnel `101 Switching Protocols` exchanges by hijacking the client connection
//!
//! # Data Flow
//! ```text
//! Client ←──── raw bytes ────→ Proxy ←──── raw bytes ────→ Backend
//!        (hijacked OnUpgrade)          (hyper::upgrade::on)
//! ```
//!
//! # Design Decisions
//! - Hop-by-hop headers are stripped both ways, except on upgrade exchanges
//! - Request bodies stream through; response bodies are read fully into the writer
//! - HEAD is sent upstream as GET so rewriters can size the body the client would have got

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderMap, Method, Request, Response, StatusCode, Uri, Version};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper::upgrade::OnUpgrade;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::time::Duration;

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::http::response::strip_hop_by_hop;
use crate::intercept::error::{ConfigurationError, UpstreamError};
use crate::intercept::sink::{hijack, ResponseWriter};
use crate::intercept::upgrade::is_upgrade;
use crate::intercept::upstream::Upstream;

/// Upstream that proxies to a single backend server.
pub struct BackendUpstream {
    client: Client<HttpConnector, Body>,
    authority: Authority,
}

impl BackendUpstream {
    pub fn new(config: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, ConfigurationError> {
        let authority = config
            .address
            .parse::<Authority>()
            .map_err(|_| ConfigurationError::InvalidUpstream(config.address.clone()))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self { client, authority })
    }

    fn backend_uri(&self, uri: &Uri) -> Result<Uri, UpstreamError> {
        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Uri::from_parts(parts).map_err(|e| UpstreamError::Other(e.into()))
    }
}

impl Upstream for BackendUpstream {
    fn serve<'a>(
        &'a self,
        request: Request<Body>,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        Box::pin(async move {
            let upgrade = is_upgrade(request.headers());
            let (mut parts, body) = request.into_parts();
            parts.uri = self.backend_uri(&parts.uri)?;
            parts.version = Version::HTTP_11;
            if parts.method == Method::HEAD {
                parts.method = Method::GET;
            }
            if !upgrade {
                strip_hop_by_hop(&mut parts.headers);
            }

            let mut response = self.client.request(Request::from_parts(parts, body)).await?;

            if response.status() == StatusCode::SWITCHING_PROTOCOLS {
                return tunnel(response, writer);
            }

            strip_hop_by_hop(response.headers_mut());
            let (parts, body) = response.into_parts();
            write_head(writer, parts.status, &parts.headers);

            let bytes = axum::body::to_bytes(Body::new(body), usize::MAX).await?;
            writer.write_body(&bytes);
            Ok(())
        })
    }
}

fn write_head(writer: &mut dyn ResponseWriter, status: StatusCode, headers: &HeaderMap) {
    for (name, value) in headers {
        writer.add_header(name.clone(), value.clone());
    }
    writer.write_status(status);
}

/// Complete a protocol switch: take over the client connection and relay raw bytes.
fn tunnel(mut response: Response<Incoming>, writer: &mut dyn ResponseWriter) -> Result<(), UpstreamError> {
    let client_side = hijack(writer)?;
    let backend_side = hyper::upgrade::on(&mut response);

    write_head(writer, StatusCode::SWITCHING_PROTOCOLS, response.headers());

    tokio::spawn(async move {
        match relay(client_side, backend_side).await {
            Ok((to_backend, to_client)) => {
                tracing::debug!(to_backend, to_client, "Upgraded connection closed");
            }
            Err(e) => tracing::warn!(error = %e, "Upgraded connection failed"),
        }
    });
    Ok(())
}

async fn relay(client: OnUpgrade, backend: OnUpgrade) -> std::io::Result<(u64, u64)> {
    let (client, backend) = tokio::try_join!(client, backend).map_err(std::io::Error::other)?;
    let mut client = TokioIo::new(client);
    let mut backend = TokioIo::new(backend);
    tokio::io::copy_bidirectional(&mut client, &mut backend).await
}
