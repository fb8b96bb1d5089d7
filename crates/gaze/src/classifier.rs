//! Per-frame looking-away classification

use camera_capture::VideoFrame;
use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detector::{BoundingBox, RegionDetector};
use crate::pupil::PupilEstimator;
use crate::{GazeConfig, GazeError};

/// Per-frame verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GazeFrameResult {
    /// Any face detected, inside the region of interest or not
    pub face_detected: bool,
    /// Eyes detected on faces inside the region of interest
    pub eye_count: u32,
    /// Final verdict for the frame
    pub looking_away: bool,
}

/// The evaluated eye of a face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeSample {
    /// Eye box in frame coordinates
    pub bbox: BoundingBox,
    /// Pupil x in frame coordinates
    pub pupil_x: Option<f32>,
    /// Pupil x relative to the eye box width, in [0, 1]
    pub pupil_ratio: Option<f32>,
}

/// A detected face and what was found inside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSample {
    pub bbox: BoundingBox,
    /// Center inside the region of interest
    pub in_roi: bool,
    /// First eye, only evaluated for faces inside the region of interest
    pub eye: Option<EyeSample>,
}

/// Classification result plus the detections behind it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub result: GazeFrameResult,
    pub faces: Vec<FaceSample>,
}

/// Central region of a frame treated as "facing the screen"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionOfInterest {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
}

impl RegionOfInterest {
    /// Frame minus `margin` of its size on every side
    pub fn central(width: u32, height: u32, margin: f32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            x_min: w * margin,
            x_max: w * (1.0 - margin),
            y_min: h * margin,
            y_max: h * (1.0 - margin),
        }
    }

    /// Whether a point lies inside the region (edges included)
    pub fn contains_point(&self, (x, y): (f32, f32)) -> bool {
        (self.x_min..=self.x_max).contains(&x) && (self.y_min..=self.y_max).contains(&y)
    }

    /// Bounding box of the region, for drawing
    pub fn to_bbox(&self) -> Option<BoundingBox> {
        BoundingBox::new(
            self.x_min as u32,
            self.y_min as u32,
            (self.x_max - self.x_min) as u32,
            (self.y_max - self.y_min) as u32,
        )
    }
}

/// Combines region detection and pupil estimation into one boolean per frame.
///
/// Every failure along the way (no face, no eye, no pupil, detector error)
/// leaves the frame classified as looking away.
pub struct GazeClassifier {
    detector: RegionDetector,
    pupil: PupilEstimator,
    roi_margin: f32,
    pupil_min_ratio: f32,
    pupil_max_ratio: f32,
}

impl GazeClassifier {
    /// Create a classifier, validating `config`
    pub fn new(detector: RegionDetector, config: &GazeConfig) -> Result<Self, GazeError> {
        config.validate()?;
        Ok(Self {
            detector,
            pupil: PupilEstimator::new(config.pupil_threshold),
            roi_margin: config.roi_margin,
            pupil_min_ratio: config.pupil_min_ratio,
            pupil_max_ratio: config.pupil_max_ratio,
        })
    }

    /// Load the configured detector models
    pub fn from_config(config: &GazeConfig) -> Result<Self, GazeError> {
        Self::new(RegionDetector::from_config(config)?, config)
    }

    /// Margin used for the region of interest
    pub fn roi_margin(&self) -> f32 {
        self.roi_margin
    }

    /// Whether a pupil offset ratio counts as frontal gaze
    pub fn is_attentive_ratio(&self, ratio: f32) -> bool {
        ratio > self.pupil_min_ratio && ratio < self.pupil_max_ratio
    }

    /// Classify one frame; a buffer that does not match its dimensions is rejected
    pub fn classify(&self, frame: &VideoFrame) -> Result<FrameAnalysis, GazeError> {
        if !frame.is_well_formed() {
            return Err(GazeError::ImageProcessing(format!(
                "frame {} is {}x{} with {} bytes",
                frame.sequence,
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }
        Ok(self.classify_gray(&frame.to_grayscale()))
    }

    /// Classify an already converted grayscale frame
    pub fn classify_gray(&self, gray: &GrayImage) -> FrameAnalysis {
        let faces = match self.detector.detect_faces(gray) {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Face detection failed, treating frame as empty: {}", e);
                Vec::new()
            }
        };

        let roi = RegionOfInterest::central(gray.width(), gray.height(), self.roi_margin);
        let mut result = GazeFrameResult {
            face_detected: !faces.is_empty(),
            eye_count: 0,
            looking_away: true,
        };

        let samples: Vec<FaceSample> = faces
            .into_iter()
            .map(|face| {
                let in_roi = roi.contains_point(face.center());
                if !in_roi {
                    debug!("Ignoring face outside region of interest: {:?}", face);
                    return FaceSample { bbox: face, in_roi, eye: None };
                }

                let (eye, eye_count) = self.first_eye(gray, &face);
                result.eye_count += eye_count;
                if eye
                    .and_then(|e| e.pupil_ratio)
                    .is_some_and(|ratio| self.is_attentive_ratio(ratio))
                {
                    result.looking_away = false;
                }
                FaceSample { bbox: face, in_roi, eye }
            })
            .collect();

        FrameAnalysis { result, faces: samples }
    }

    /// Evaluate the first eye detected in `face`; also returns how many eyes were found
    fn first_eye(&self, gray: &GrayImage, face: &BoundingBox) -> (Option<EyeSample>, u32) {
        let face_region =
            imageops::crop_imm(gray, face.x, face.y, face.width, face.height).to_image();

        let eyes = match self.detector.detect_eyes(&face_region) {
            Ok(eyes) => eyes,
            Err(e) => {
                warn!("Eye detection failed, treating face as eyeless: {}", e);
                return (None, 0);
            }
        };

        // Eye boxes are clamped into the face region, so the face encloses them
        let Some((eye, frame_eye)) = eyes
            .iter()
            .map(|eye| (eye, eye.translate(face.x, face.y)))
            .find(|(_, frame_eye)| face.contains(frame_eye))
        else {
            return (None, 0);
        };

        let eye_region =
            imageops::crop_imm(&face_region, eye.x, eye.y, eye.width, eye.height).to_image();
        let pupil_local = self.pupil.estimate(&eye_region);

        let sample = EyeSample {
            bbox: frame_eye,
            pupil_x: pupil_local.map(|cx| frame_eye.x as f32 + cx),
            pupil_ratio: pupil_local.map(|cx| (cx / eye.width as f32).clamp(0.0, 1.0)),
        };
        (Some(sample), eyes.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{Detection, ObjectDetector};
    use image::Luma;
    use imageproc::drawing::draw_filled_circle_mut;

    const W: u32 = 200;
    const H: u32 = 150;

    fn boxed(x: u32, y: u32, w: u32, h: u32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x, y, w, h).unwrap(),
            score: 0.9,
        }
    }

    fn fixed(detections: Vec<Detection>) -> Box<dyn ObjectDetector> {
        Box::new(move |_: &GrayImage| -> Result<Vec<Detection>, GazeError> {
            Ok(detections.clone())
        })
    }

    fn failing() -> Box<dyn ObjectDetector> {
        Box::new(|_: &GrayImage| -> Result<Vec<Detection>, GazeError> {
            Err(GazeError::Inference("boom".into()))
        })
    }

    /// Frame with a dark pupil drawn at `pupil` (frame coordinates)
    fn frame_with_pupil(pupil: (i32, i32)) -> GrayImage {
        let mut gray = GrayImage::from_pixel(W, H, Luma([210]));
        draw_filled_circle_mut(&mut gray, pupil, 3, Luma([5]));
        gray
    }

    fn classifier(face: Box<dyn ObjectDetector>, eye: Box<dyn ObjectDetector>) -> GazeClassifier {
        GazeClassifier::new(RegionDetector::new(face, eye), &GazeConfig::default()).unwrap()
    }

    // Face at (60,40) 80x70 -> center (100, 75), inside the ROI.
    // Eye at face-local (10,10) 40x20 -> frame (70,50)..(110,70).
    fn centered_face() -> Box<dyn ObjectDetector> {
        fixed(vec![boxed(60, 40, 80, 70)])
    }

    fn one_eye() -> Box<dyn ObjectDetector> {
        fixed(vec![boxed(10, 10, 40, 20)])
    }

    #[test]
    fn test_no_faces_is_looking_away() {
        let analysis = classifier(fixed(vec![]), one_eye()).classify_gray(&frame_with_pupil((90, 60)));
        assert_eq!(
            analysis.result,
            GazeFrameResult { face_detected: false, eye_count: 0, looking_away: true }
        );
    }

    #[test]
    fn test_centered_pupil_is_attentive() {
        let analysis = classifier(centered_face(), one_eye()).classify_gray(&frame_with_pupil((90, 60)));
        assert!(analysis.result.face_detected);
        assert_eq!(analysis.result.eye_count, 1);
        assert!(!analysis.result.looking_away);

        let eye = analysis.faces[0].eye.unwrap();
        let ratio = eye.pupil_ratio.unwrap();
        assert!((ratio - 0.5).abs() < 0.1, "ratio = {}", ratio);
    }

    #[test]
    fn test_pupil_at_eye_edge_is_looking_away() {
        let analysis = classifier(centered_face(), one_eye()).classify_gray(&frame_with_pupil((72, 60)));
        assert!(analysis.result.looking_away);
        assert!(analysis.faces[0].eye.unwrap().pupil_ratio.unwrap() <= 0.1);
    }

    #[test]
    fn test_face_outside_roi_is_ignored() {
        // Center (20, 75) lies left of the 20% margin; eyes would show a centered pupil.
        let face = fixed(vec![boxed(0, 40, 40, 70)]);
        let analysis = classifier(face, one_eye()).classify_gray(&frame_with_pupil((30, 60)));
        assert!(analysis.result.face_detected);
        assert_eq!(analysis.result.eye_count, 0);
        assert!(analysis.result.looking_away);
        assert!(!analysis.faces[0].in_roi);
    }

    #[test]
    fn test_no_eye_is_looking_away() {
        let analysis = classifier(centered_face(), fixed(vec![])).classify_gray(&frame_with_pupil((90, 60)));
        assert!(analysis.result.face_detected);
        assert!(analysis.result.looking_away);
    }

    #[test]
    fn test_no_pupil_is_looking_away() {
        let gray = GrayImage::from_pixel(W, H, Luma([210]));
        let analysis = classifier(centered_face(), one_eye()).classify_gray(&gray);
        assert_eq!(analysis.faces[0].eye.unwrap().pupil_ratio, None);
        assert!(analysis.result.looking_away);
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let frame = VideoFrame::new(vec![0; 10], 4, 4, 0, 7);
        let err = classifier(centered_face(), one_eye()).classify(&frame).unwrap_err();
        assert!(matches!(err, GazeError::ImageProcessing(_)));
    }

    #[test]
    fn test_detector_failure_degrades_to_no_detection() {
        let analysis = classifier(failing(), one_eye()).classify_gray(&frame_with_pupil((90, 60)));
        assert!(!analysis.result.face_detected);
        assert!(analysis.result.looking_away);

        let analysis = classifier(centered_face(), failing()).classify_gray(&frame_with_pupil((90, 60)));
        assert!(analysis.result.face_detected);
        assert!(analysis.result.looking_away);
    }

    #[test]
    fn test_only_first_eye_is_evaluated() {
        // The first eye has no pupil; the second would be centered.
        let eyes = fixed(vec![boxed(45, 10, 30, 20), boxed(10, 10, 40, 20)]);
        let analysis = classifier(centered_face(), eyes).classify_gray(&frame_with_pupil((90, 60)));
        assert_eq!(analysis.result.eye_count, 2);
        assert!(analysis.result.looking_away);
    }

    #[test]
    fn test_roi_bounds() {
        let roi = RegionOfInterest::central(100, 50, 0.2);
        assert!(roi.contains_point((20.0, 10.0)));
        assert!(roi.contains_point((80.0, 40.0)));
        assert!(!roi.contains_point((19.9, 25.0)));
        assert!(!roi.contains_point((50.0, 40.1)));
    }
}
