use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::info;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod handlers;
mod metrics;
mod ws;

use crate::config::{FileConfig, ServerConfig, load_config};
use crate::metrics::ServerMetrics;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "livepoll")]
#[command(about = "Real-time classroom polling server")]
struct Cli {
    /// Port for the web server (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Path to the TOML config file
    #[arg(short, long, default_value = "livepoll.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    /// Registries, hub, and metrics shared by every connection
    pub context: Arc<ws::ServerContext>,
}

/// Routes shared by the binary and the end-to-end tests.
pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ws", get(handlers::poll_websocket_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/participants", get(handlers::participants_handler))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "live_poll=debug,live_poll_core=debug,tower_http=debug,info"
    } else {
        "live_poll=info,live_poll_core=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let file_config: FileConfig = load_config(&cli.config)
        .extract()
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    let server_config =
        Arc::new(ServerConfig::from_file(&file_config).with_overrides(cli.host, cli.port));

    info!("Starting Live Poll");
    info!(
        "Poll config: enforce_time_limit={}, max_retained_polls={}",
        server_config.polls.enforce_time_limit, server_config.polls.max_retained_polls
    );

    let metrics = Arc::new(ServerMetrics::new());
    let context = Arc::new(ws::ServerContext::new(server_config.clone(), metrics));
    let shutdown_token = context.shutdown.clone();

    let app = build_router(AppState { context })
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive());

    let addr = server_config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Live Poll listening on http://{}", actual_addr);
    info!("  GET /api/ws       - WebSocket event stream");
    info!("  GET /health       - Server status");
    info!("  GET /metrics      - Counters");
    info!("  GET /participants - Registered participants");

    // Create shutdown signal handler
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
        shutdown_token.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}
