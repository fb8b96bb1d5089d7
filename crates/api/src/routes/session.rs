//! Session Routes

use axum::{extract::State, Json};
use pipeline::{HealthStatus, SessionInfo, SessionSummary};
use serde::Serialize;
use std::sync::Arc;

use crate::{ApiError, AppState};

/// Response for start and stop requests
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
}

impl ActionResponse {
    /// Failed action with a message
    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            session: None,
            summary: None,
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Start a tracking session
pub async fn start_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ActionResponse>, ApiError> {
    let session = state.controller.start().await?;
    Ok(Json(ActionResponse {
        success: true,
        message: "Eye tracking started".to_string(),
        session: Some(session),
        summary: None,
    }))
}

/// Stop the active tracking session
pub async fn stop_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ActionResponse>, ApiError> {
    let summary = state.controller.stop().await?;
    Ok(Json(ActionResponse {
        success: true,
        message: "Eye tracking stopped".to_string(),
        session: None,
        summary: Some(summary),
    }))
}

/// Health check handler
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: state.controller.health(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
