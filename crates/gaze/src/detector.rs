//! Face and eye region detection

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::onnx::OnnxDetector;
use crate::{DetectorConfig, GazeConfig, GazeError};

/// Overlap above which two raw candidates describe the same object
const GROUP_IOU_THRESHOLD: f32 = 0.3;

/// Axis-aligned box in pixel coordinates of the image it was detected in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Create a box, `None` when it would be empty
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { x, y, width, height })
    }

    /// Geometric center
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Box area in pixels
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Intersect with a `width` x `height` image
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let right = self.x.saturating_add(self.width).min(width);
        let bottom = self.y.saturating_add(self.height).min(height);
        Self::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }

    /// Shift by an offset, e.g. from face-local to frame coordinates
    pub fn translate(&self, dx: u32, dy: u32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Whether `other` lies entirely inside this box
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Intersection over union
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = self.right().min(other.right()).saturating_sub(self.x.max(other.x));
        let iy = self.bottom().min(other.bottom()).saturating_sub(self.y.max(other.y));
        let inter = ix as u64 * iy as u64;
        let union = self.area() + other.area() - inter;
        if union == 0 {
            0.0
        } else {
            inter as f32 / union as f32
        }
    }
}

/// A scored detector candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
}

/// Opaque detection capability: grayscale image in, boxes out.
///
/// Implementations may return zero boxes; an `Err` means the detector itself
/// failed and the caller decides how to degrade.
pub trait ObjectDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<Detection>, GazeError>;
}

impl<F> ObjectDetector for F
where
    F: Fn(&GrayImage) -> Result<Vec<Detection>, GazeError>,
{
    fn detect(&self, gray: &GrayImage) -> Result<Vec<Detection>, GazeError> {
        self(gray)
    }
}

/// Stand-in used when no model is configured
pub struct NullDetector {
    name: &'static str,
}

impl NullDetector {
    /// Create a detector that never finds anything
    pub fn new(name: &'static str) -> Self {
        warn!("No {} model path configured. Every frame will have zero {} detections.", name, name);
        Self { name }
    }
}

impl ObjectDetector for NullDetector {
    fn detect(&self, _gray: &GrayImage) -> Result<Vec<Detection>, GazeError> {
        debug!("{} detector has no model", self.name);
        Ok(Vec::new())
    }
}

fn load_detector(
    name: &'static str,
    config: &DetectorConfig,
) -> Result<Box<dyn ObjectDetector>, GazeError> {
    match &config.model_path {
        Some(path) => {
            info!("Loading {} detection model from {}", name, path.display());
            Ok(Box::new(OnnxDetector::load(path, config)?))
        }
        None => Ok(Box::new(NullDetector::new(name))),
    }
}

/// Merge overlapping raw candidates the way cascade detectors group their
/// sliding-window hits. Output is ordered by descending score.
pub fn group_detections(mut candidates: Vec<Detection>, min_neighbors: u32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut clusters: Vec<(Detection, u32)> = Vec::new();
    for candidate in candidates {
        match clusters
            .iter_mut()
            .find(|(head, _)| head.bbox.iou(&candidate.bbox) >= GROUP_IOU_THRESHOLD)
        {
            Some((_, members)) => *members += 1,
            None => clusters.push((candidate, 1)),
        }
    }

    clusters
        .into_iter()
        .filter(|(_, members)| *members > min_neighbors)
        .map(|(head, _)| head)
        .collect()
}

/// Face detector plus eye detector
pub struct RegionDetector {
    face: Box<dyn ObjectDetector>,
    eye: Box<dyn ObjectDetector>,
}

impl RegionDetector {
    /// Create a region detector from face and eye detectors
    pub fn new(face: Box<dyn ObjectDetector>, eye: Box<dyn ObjectDetector>) -> Self {
        Self { face, eye }
    }

    /// Load the configured models
    pub fn from_config(config: &GazeConfig) -> Result<Self, GazeError> {
        Ok(Self::new(
            load_detector("face", &config.face)?,
            load_detector("eye", &config.eye)?,
        ))
    }

    /// Candidate faces in frame coordinates
    pub fn detect_faces(&self, gray_frame: &GrayImage) -> Result<Vec<BoundingBox>, GazeError> {
        Ok(clamp_all(self.face.detect(gray_frame)?, gray_frame))
    }

    /// Candidate eyes in coordinates local to `gray_face`
    pub fn detect_eyes(&self, gray_face: &GrayImage) -> Result<Vec<BoundingBox>, GazeError> {
        Ok(clamp_all(self.eye.detect(gray_face)?, gray_face))
    }
}

fn clamp_all(detections: Vec<Detection>, image: &GrayImage) -> Vec<BoundingBox> {
    let (width, height) = image.dimensions();
    detections
        .into_iter()
        .filter_map(|d| d.bbox.clamp_to(width, height))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: u32, y: u32, w: u32, h: u32) -> BoundingBox {
        BoundingBox::new(x, y, w, h).unwrap()
    }

    fn det(x: u32, y: u32, w: u32, h: u32, score: f32) -> Detection {
        Detection { bbox: bbox(x, y, w, h), score }
    }

    #[test]
    fn test_empty_box_rejected() {
        assert!(BoundingBox::new(1, 1, 0, 5).is_none());
        assert!(BoundingBox::new(1, 1, 5, 0).is_none());
    }

    #[test]
    fn test_clamp_to_image() {
        assert_eq!(bbox(90, 90, 20, 20).clamp_to(100, 100), Some(bbox(90, 90, 10, 10)));
        assert_eq!(bbox(120, 0, 10, 10).clamp_to(100, 100), None);
    }

    #[test]
    fn test_iou_and_contains() {
        let a = bbox(0, 0, 10, 10);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&bbox(20, 20, 5, 5)), 0.0);
        assert!((a.iou(&bbox(5, 0, 10, 10)) - 50.0 / 150.0).abs() < 1e-6);
        assert!(a.contains(&bbox(2, 2, 3, 3)));
        assert!(!a.contains(&bbox(8, 8, 3, 3)));
    }

    #[test]
    fn test_grouping_merges_and_orders() {
        let grouped = group_detections(
            vec![
                det(0, 0, 10, 10, 0.6),
                det(1, 1, 10, 10, 0.9),
                det(50, 50, 10, 10, 0.7),
            ],
            0,
        );
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].score, 0.9);
        assert_eq!(grouped[1].bbox, bbox(50, 50, 10, 10));
    }

    #[test]
    fn test_grouping_min_neighbors() {
        let grouped = group_detections(
            vec![
                det(0, 0, 10, 10, 0.6),
                det(1, 1, 10, 10, 0.9),
                det(50, 50, 10, 10, 0.7),
            ],
            1,
        );
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].bbox, bbox(1, 1, 10, 10));
    }

    #[test]
    fn test_region_detector_clamps() {
        let face = |_: &GrayImage| -> Result<Vec<Detection>, GazeError> {
            Ok(vec![det(50, 50, 100, 100, 0.9), det(500, 500, 5, 5, 0.8)])
        };
        let eye = |_: &GrayImage| -> Result<Vec<Detection>, GazeError> { Ok(Vec::new()) };
        let detector = RegionDetector::new(Box::new(face), Box::new(eye));

        let faces = detector.detect_faces(&GrayImage::new(120, 100)).unwrap();
        assert_eq!(faces, vec![bbox(50, 50, 70, 50)]);
        assert!(detector.detect_eyes(&GrayImage::new(10, 10)).unwrap().is_empty());
    }

    #[test]
    fn test_null_detector_finds_nothing() {
        let detector = RegionDetector::from_config(&GazeConfig::default()).unwrap();
        assert!(detector.detect_faces(&GrayImage::new(64, 48)).unwrap().is_empty());
    }
}
