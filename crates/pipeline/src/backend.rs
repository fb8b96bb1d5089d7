//! Session resource factories

use camera_capture::{CameraConfig, CameraError, FrameSource};
use gaze::{GazeClassifier, GazeConfig, GazeError};

/// Builds the per-session resources.
///
/// Both methods run on the capture worker thread, so the device handle and
/// the detector models are created, used, and dropped on that thread.
pub trait SessionBackend: Send + Sync {
    fn open_source(&self) -> Result<Box<dyn FrameSource>, CameraError>;

    fn build_classifier(&self) -> Result<GazeClassifier, GazeError>;
}

/// Configured camera plus configured detector models
#[derive(Debug, Clone, Default)]
pub struct DefaultBackend {
    pub camera: CameraConfig,
    pub gaze: GazeConfig,
}

impl DefaultBackend {
    /// Create a backend from camera and gaze settings
    pub fn new(camera: CameraConfig, gaze: GazeConfig) -> Self {
        Self { camera, gaze }
    }
}

impl SessionBackend for DefaultBackend {
    fn open_source(&self) -> Result<Box<dyn FrameSource>, CameraError> {
        camera_capture::open_source(&self.camera)
    }

    fn build_classifier(&self) -> Result<GazeClassifier, GazeError> {
        GazeClassifier::from_config(&self.gaze)
    }
}
