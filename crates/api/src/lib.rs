//! Gaze Monitor API Server
//!
//! HTTP control surface for the tracking session and WebSocket stream for viewers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use pipeline::{DefaultBackend, PipelineController, PipelineError};
use std::sync::Arc;
use stream::StreamPublisher;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
mod routes;
mod ws;

pub use crate::config::{AppConfig, LoggingConfig, ServerConfig};
pub use routes::session::ActionResponse;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("Invalid gaze configuration: {0}")]
    Gaze(#[from] gaze::GazeError),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(PipelineError::NoActiveSession)
            | ApiError::Pipeline(PipelineError::SessionAlreadyActive) => StatusCode::CONFLICT,
            ApiError::Pipeline(PipelineError::DeviceUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ActionResponse::failure(self.to_string());
        (status, Json(body)).into_response()
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Tracking session controller
    pub controller: Arc<PipelineController>,
    /// Prometheus exposition handle
    pub metrics: PrometheusHandle,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(controller: Arc<PipelineController>, metrics: PrometheusHandle) -> Self {
        Self {
            controller,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/start", post(routes::session::start_session))
        .route("/api/stop", post(routes::session::stop_session))
        .route("/api/health", get(routes::session::health))
        .route("/metrics", get(routes::metrics::render))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Initialize logging
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// Run the server until Ctrl-C, then stop any active session
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let metrics = PrometheusBuilder::new().install_recorder()?;

    let backend = Arc::new(DefaultBackend::new(config.camera.clone(), config.gaze.clone()));
    let publisher = StreamPublisher::new(&config.stream);
    let controller = Arc::new(PipelineController::new(
        backend,
        publisher,
        config.pipeline.clone(),
    ));

    if config.auto_start {
        match controller.start().await {
            Ok(session) => info!("Auto-started session {} on {}", session.id, session.source),
            Err(e) => warn!("Auto-start failed, waiting for a start request: {}", e),
        }
    }

    let state = Arc::new(AppState::new(Arc::clone(&controller), metrics));
    let app = create_router(state);

    let addr = config.bind_addr();
    info!("Starting API server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match controller.stop().await {
        Ok(summary) => info!(
            "Stopped session {} on shutdown ({} cheating attempts)",
            summary.id, summary.cheating_attempts
        ),
        Err(PipelineError::NoActiveSession) => {}
        Err(e) => warn!("Failed to stop session on shutdown: {}", e),
    }
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
    }
}
