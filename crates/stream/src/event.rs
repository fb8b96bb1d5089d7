//! Stream event types

use serde::{Deserialize, Serialize};

use crate::PublishError;

/// Seconds since the Unix epoch, with millisecond precision
pub fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Event envelope sent to viewers as `{"event": <name>, "data": <payload>}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Greeting sent once per viewer connection
    Connection { message: String, timestamp: f64 },

    /// Base64-encoded JPEG of the annotated frame
    VideoFrame(String),

    /// Per-frame classification summary
    GazeStatus {
        face_detected: bool,
        eye_count: u32,
        looking_away: bool,
        timestamp: f64,
    },

    /// Debounce threshold crossing
    Alert { message: String, count: u32 },

    /// Reply to a viewer ping
    Pong { timestamp: f64 },

    /// Command failure reported to a single viewer
    Error { message: String },

    /// Session start/stop acknowledgement
    Session { running: bool, message: String },
}

impl StreamEvent {
    /// Greeting sent to a newly connected viewer
    pub fn connection() -> Self {
        StreamEvent::Connection {
            message: "Connected to gaze monitor".to_string(),
            timestamp: unix_timestamp(),
        }
    }

    /// Reply to a viewer ping
    pub fn pong() -> Self {
        StreamEvent::Pong {
            timestamp: unix_timestamp(),
        }
    }

    /// Event name as sent on the wire
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Connection { .. } => "connection",
            StreamEvent::VideoFrame(_) => "video_frame",
            StreamEvent::GazeStatus { .. } => "gaze_status",
            StreamEvent::Alert { .. } => "alert",
            StreamEvent::Pong { .. } => "pong",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Session { .. } => "session",
        }
    }

    /// Serialize to the JSON text sent to viewers
    pub fn to_json(&self) -> Result<String, PublishError> {
        serde_json::to_string(self).map_err(|e| PublishError::Encode(e.to_string()))
    }
}

/// Commands a viewer may send over its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerCommand {
    Ping,
    StartTracking,
    StopTracking,
}
