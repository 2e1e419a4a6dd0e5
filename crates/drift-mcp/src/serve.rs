//! Streamable HTTP server: MCP at `/mcp`, health at `/health`.

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether::{spawn_reaper, SessionManager, SessionRegistry};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use driftconf::HttpConfig;

use crate::handler::DriftHandler;
use crate::resolver::ServiceResolver;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
    /// `None` disables idle expiry.
    pub session_idle: Option<Duration>,
    pub reap_interval: Duration,
}

impl From<&HttpConfig> for ServeConfig {
    fn from(http: &HttpConfig) -> Self {
        Self {
            bind: http.bind.clone(),
            port: http.port,
            session_idle: (http.session_idle_secs > 0).then(|| Duration::from_secs(http.session_idle_secs)),
            reap_interval: Duration::from_secs(http.reap_interval_secs.max(1)),
        }
    }
}

/// Server state for health endpoint
#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<SessionRegistry>,
    pub resolver: Arc<ServiceResolver>,
    pub start_time: Instant,
}

/// Health check endpoint
pub async fn handle_health(State(state): State<HealthState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.registry.len(),
        "services": state.resolver.services().len(),
    }))
}

/// Session manager wired with lifecycle logging.
pub fn session_manager(handler: Arc<DriftHandler>) -> Arc<SessionManager> {
    Arc::new(
        SessionManager::new(handler)
            .with_session_closed(|session_id| {
                info!(session_id = %session_id, "MCP session closed");
            })
            .with_error_handler(|error| {
                warn!(error = %error, "MCP transport error");
            }),
    )
}

/// Full application router.
pub fn app(manager: Arc<SessionManager>, resolver: Arc<ServiceResolver>) -> Router {
    let health_state = HealthState {
        registry: Arc::clone(manager.registry()),
        resolver,
        start_time: Instant::now(),
    };

    let health_router = Router::new()
        .route("/health", get(handle_health))
        .with_state(health_state);

    Router::new()
        .nest("/mcp", tether::transport::router(manager))
        .merge(health_router)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until SIGINT/SIGTERM.
pub async fn run(handler: Arc<DriftHandler>, config: ServeConfig) -> Result<()> {
    info!("drift-mcp HTTP server starting");

    let resolver = Arc::clone(handler.resolver());
    let manager = session_manager(handler);
    let registry = Arc::clone(manager.registry());

    let cancel = CancellationToken::new();
    let reaper = config.session_idle.map(|max_idle| {
        info!(
            idle_secs = max_idle.as_secs(),
            interval_secs = config.reap_interval.as_secs(),
            "Idle session reaper enabled"
        );
        spawn_reaper(Arc::clone(&registry), config.reap_interval, max_idle, cancel.clone())
    });

    let app = app(manager, resolver);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("   MCP (Streamable): POST/GET/DELETE http://{}/mcp", addr);
    info!("   Health: GET http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Some(reaper) = reaper {
        if let Err(e) = reaper.await {
            warn!(error = %e, "Reaper task ended abnormally");
        }
    }
    let remaining = registry.len();
    registry.clear();

    info!(sessions_dropped = remaining, "Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
