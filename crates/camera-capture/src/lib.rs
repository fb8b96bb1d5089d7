//! Camera Capture Library for Gaze Monitoring
//!
//! Provides frame sources for the capture worker:
//! - V4L2 webcam devices (feature `v4l2`)
//! - Image sequences replayed from a directory (demos, tests, kiosks without a camera)

pub mod frame;
pub mod source;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use frame::VideoFrame;
pub use source::{FrameSource, Frames, ImageSequenceSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Failed to read frame: {0}")]
    Read(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Capture timeout")]
    Timeout,

    #[error("Camera not initialized")]
    NotInitialized,
}

impl CameraError {
    /// Whether the error only affects the current frame
    pub fn is_transient(&self) -> bool {
        matches!(self, CameraError::Read(_) | CameraError::Timeout | CameraError::Format(_))
    }

    /// Classify an I/O failure while dequeuing a frame
    pub fn from_read_io(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => CameraError::Timeout,
            _ => CameraError::Read(e.to_string()),
        }
    }
}

/// Capture backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    /// Webcam exposed through Video4Linux2
    #[default]
    V4l2,
    /// Directory of still images replayed in a loop
    ImageSequence,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture backend
    pub backend: CameraBackend,
    /// Device path (e.g., "/dev/video0") or image directory
    pub device: String,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Requested FPS
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::V4l2,
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            fps: 10,
        }
    }
}

impl CameraConfig {
    /// Replay the images found in `dir`
    pub fn image_sequence(dir: impl Into<String>) -> Self {
        Self {
            backend: CameraBackend::ImageSequence,
            device: dir.into(),
            ..Default::default()
        }
    }
}

/// Open the frame source described by `config`
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    match config.backend {
        CameraBackend::ImageSequence => Ok(Box::new(ImageSequenceSource::open(&config.device)?)),
        #[cfg(feature = "v4l2")]
        CameraBackend::V4l2 => Ok(Box::new(v4l2::V4l2Source::open(config)?)),
        #[cfg(not(feature = "v4l2"))]
        CameraBackend::V4l2 => Err(CameraError::Open(format!(
            "{}: built without V4L2 support (enable the `v4l2` feature)",
            config.device
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_image_directory_is_open_error() {
        let config = CameraConfig::image_sequence("/definitely/not/here");
        let err = open_source(&config).err().expect("open should fail");
        assert!(matches!(err, CameraError::Open(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_read_errors_are_transient() {
        assert!(CameraError::Read("glitch".into()).is_transient());
        assert!(CameraError::Timeout.is_transient());
        assert!(!CameraError::NotInitialized.is_transient());
    }

    #[test]
    fn test_read_io_timeout_maps_to_timeout() {
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "VIDIOC_DQBUF");
        assert!(matches!(CameraError::from_read_io(timed_out), CameraError::Timeout));

        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "device unplugged");
        let err = CameraError::from_read_io(broken);
        assert!(matches!(err, CameraError::Read(ref msg) if msg.contains("unplugged")));
    }

    #[cfg(not(feature = "v4l2"))]
    #[test]
    fn test_v4l2_unavailable_without_feature() {
        let err = open_source(&CameraConfig::default()).err().expect("open should fail");
        assert!(matches!(err, CameraError::Open(_)));
    }
}
