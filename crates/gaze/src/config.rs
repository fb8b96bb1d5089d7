//! Gaze classification configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Object detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// ONNX model path. Without a model the detector finds nothing.
    pub model_path: Option<PathBuf>,
    /// Model input width
    pub input_width: u32,
    /// Model input height
    pub input_height: u32,
    /// Minimum candidate score
    pub score_threshold: f32,
    /// A grouped box is kept when more than this many candidates overlap it
    pub min_neighbors: u32,
    /// Minimum box side in input pixels
    pub min_size: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::face()
    }
}

impl DetectorConfig {
    /// Face detector defaults
    pub fn face() -> Self {
        Self {
            model_path: None,
            input_width: 320,
            input_height: 240,
            score_threshold: 0.6,
            min_neighbors: 0,
            min_size: 30,
        }
    }

    /// Eye detector defaults
    pub fn eye() -> Self {
        Self {
            model_path: None,
            input_width: 96,
            input_height: 96,
            score_threshold: 0.5,
            min_neighbors: 0,
            min_size: 8,
        }
    }
}

/// Gaze classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Fraction of the frame excluded on each side of the region of interest
    pub roi_margin: f32,
    /// Pupil offset ratio must be strictly greater than this
    pub pupil_min_ratio: f32,
    /// Pupil offset ratio must be strictly less than this
    pub pupil_max_ratio: f32,
    /// Inverse threshold cutoff applied after histogram equalisation
    pub pupil_threshold: u8,
    /// Face detector
    pub face: DetectorConfig,
    /// Eye detector
    pub eye: DetectorConfig,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            roi_margin: 0.2,
            pupil_min_ratio: 0.1,
            pupil_max_ratio: 0.9,
            pupil_threshold: 50,
            face: DetectorConfig::face(),
            eye: DetectorConfig::eye(),
        }
    }
}

impl GazeConfig {
    /// Narrower ROI and pupil band
    pub fn strict() -> Self {
        Self {
            roi_margin: 0.25,
            pupil_min_ratio: 0.2,
            pupil_max_ratio: 0.8,
            ..Default::default()
        }
    }

    /// Wider ROI and pupil band
    pub fn lenient() -> Self {
        Self {
            roi_margin: 0.1,
            pupil_min_ratio: 0.05,
            pupil_max_ratio: 0.95,
            ..Default::default()
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), crate::GazeError> {
        if !(0.0..0.5).contains(&self.roi_margin) {
            return Err(crate::GazeError::Config(format!(
                "roi_margin must be in [0, 0.5), got {}",
                self.roi_margin
            )));
        }
        if !(0.0 <= self.pupil_min_ratio
            && self.pupil_min_ratio < self.pupil_max_ratio
            && self.pupil_max_ratio <= 1.0)
        {
            return Err(crate::GazeError::Config(format!(
                "pupil band ({}, {}) is not inside [0, 1]",
                self.pupil_min_ratio, self.pupil_max_ratio
            )));
        }
        Ok(())
    }
}
