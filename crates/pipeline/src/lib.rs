//! Gaze Monitoring Pipeline
//!
//! Owns the capture session: a dedicated worker thread reads frames,
//! classifies them, debounces the looking-away signal, and publishes the
//! results, while the control path starts, stops, and inspects it.

mod backend;
mod config;
mod controller;
mod session;
mod worker;

pub use backend::{DefaultBackend, SessionBackend};
pub use config::PipelineConfig;
pub use controller::PipelineController;
pub use session::{HealthStatus, LifecycleState, SessionInfo, SessionSummary};

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("A tracking session is already active")]
    SessionAlreadyActive,
    #[error("No active tracking session")]
    NoActiveSession,
    #[error("Detector initialisation failed: {0}")]
    Detector(String),
    #[error("Failed to spawn capture worker: {0}")]
    Spawn(String),
    #[error("Capture worker panicked")]
    WorkerPanicked,
}
