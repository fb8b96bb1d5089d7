//! Gaze classification
//!
//! Per-frame attention analysis using computer vision:
//! - Face and eye region detection
//! - Pupil localisation inside the eye
//! - Looking-away classification against a central region of interest

pub mod classifier;
pub mod config;
pub mod detector;
pub mod onnx;
pub mod pupil;

pub use classifier::{
    EyeSample, FaceSample, FrameAnalysis, GazeClassifier, GazeFrameResult, RegionOfInterest,
};
pub use config::{DetectorConfig, GazeConfig};
pub use detector::{
    group_detections, BoundingBox, Detection, NullDetector, ObjectDetector, RegionDetector,
};
pub use onnx::OnnxDetector;
pub use pupil::{ContourMoments, PupilEstimator};

use thiserror::Error;

/// Gaze error types
#[derive(Error, Debug)]
pub enum GazeError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
