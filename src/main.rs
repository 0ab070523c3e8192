//! Injecting reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request       ┌───────────────────────────────────────────────────────┐
//!     ─────────────────────┼─▶ http server ─▶ Interceptor(html) ─▶ Interceptor(js) ─┼─▶ Backend
//!                          │       │                ▲                   ▲          │
//!     Client Response      │       │         capture + inject    capture + rewrite │
//!     ◀────────────────────┼───────┘                                               │
//!                          │  config (TOML, hot reload) · observability · lifecycle │
//!                          └───────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use inject_proxy::config::watcher::ConfigWatcher;
use inject_proxy::config::{load_config, ProxyConfig};
use inject_proxy::lifecycle::{shutdown_signal, Shutdown};
use inject_proxy::observability::{logging, metrics};
use inject_proxy::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "inject-proxy", version, about = "Reverse proxy with HTML script injection and JS URL rewriting")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(short, long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "inject-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        injection = config.injection.enabled,
        url_rewrite = config.url_rewrite.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;

    // Both the watcher and the idle sender must outlive the server.
    let (_watcher, _idle_tx, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (Some(watcher.run()?), None, rx)
        }
        _ => {
            if args.watch {
                tracing::warn!("--watch has no effect without --config");
            }
            let (tx, rx) = mpsc::unbounded_channel();
            (None, Some(tx), rx)
        }
    };

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, config_updates, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
