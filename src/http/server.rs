//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with a catch-all proxy handler
//! - Wire up middleware (request ID, tracing, timeouts, body limits)
//! - Bind server to listener with graceful shutdown
//! - Swap in re-provisioned pipelines on config reload
//! - Map upstream failures to `502 Bad Gateway`

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::upgrade::OnUpgrade;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::pipeline::Pipeline;
use crate::http::request::{request_id, UuidRequestId};
use crate::http::response::HttpResponseWriter;
use crate::intercept::error::ConfigurationError;
use crate::intercept::upstream::Upstream;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ArcSwap<Pipeline>>,
}

/// HTTP server for the injecting proxy.
pub struct HttpServer {
    router: Router,
    pipeline: Arc<ArcSwap<Pipeline>>,
}

impl HttpServer {
    /// Create a new HTTP server, provisioning the pipeline from `config`.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigurationError> {
        let pipeline = Pipeline::from_config(&config)?;
        Ok(Self::with_pipeline(&config, pipeline))
    }

    /// Create a server around an already provisioned pipeline.
    pub fn with_pipeline(config: &ProxyConfig, pipeline: Pipeline) -> Self {
        let pipeline = Arc::new(ArcSwap::from_pointee(pipeline));
        let state = AppState {
            pipeline: pipeline.clone(),
        };
        let router = Self::build_router(config, state);
        Self { router, pipeline }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Each configuration received on `config_updates` is provisioned into a new pipeline. A
    /// configuration that fails to provision is logged and the current pipeline stays active.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                match Pipeline::from_config(&new_config) {
                    Ok(new_pipeline) => {
                        pipeline.store(Arc::new(new_pipeline));
                        tracing::info!("Pipeline reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to provision reloaded config, keeping current pipeline");
                    }
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Runs the request through the current pipeline and returns what it wrote.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();

    tracing::debug!(
        request_id = %request_id,
        client = %addr,
        method = %method,
        path = %request.uri().path(),
        "Proxying request"
    );

    let on_upgrade = request.extensions_mut().remove::<OnUpgrade>();
    let mut writer = HttpResponseWriter::new(on_upgrade);

    let pipeline = state.pipeline.load_full();
    match pipeline.serve(request, &mut writer).await {
        Ok(()) => {
            let response = writer.into_response();
            metrics::record_request(method.as_str(), response.status().as_u16(), start_time);
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_request(method.as_str(), 502, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
