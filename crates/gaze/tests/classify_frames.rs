//! End-to-end classification of RGB frames with scripted detectors

use camera_capture::VideoFrame;
use gaze::{
    BoundingBox, Detection, GazeClassifier, GazeConfig, GazeError, NullDetector, ObjectDetector,
    RegionDetector,
};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use proptest::prelude::*;

fn fixed(boxes: Vec<(u32, u32, u32, u32)>) -> Box<dyn ObjectDetector> {
    Box::new(move |_: &GrayImage| -> Result<Vec<Detection>, GazeError> {
        Ok(boxes
            .iter()
            .filter_map(|&(x, y, w, h)| BoundingBox::new(x, y, w, h))
            .map(|bbox| Detection { bbox, score: 1.0 })
            .collect())
    })
}

fn frame_with_pupil(x: i32, y: i32) -> VideoFrame {
    let mut image = RgbImage::from_pixel(320, 240, Rgb([200, 190, 180]));
    draw_filled_circle_mut(&mut image, (x, y), 4, Rgb([10, 10, 10]));
    VideoFrame::from_rgb_image(image, 0, 0)
}

fn scripted_classifier() -> GazeClassifier {
    // Face (100,60) 120x120, eye at face-local (20,30) 60x30 -> frame (120,90)..(180,120)
    let detector = RegionDetector::new(
        fixed(vec![(100, 60, 120, 120)]),
        fixed(vec![(20, 30, 60, 30)]),
    );
    GazeClassifier::new(detector, &GazeConfig::default()).unwrap()
}

#[test]
fn test_rgb_frame_with_centered_pupil() {
    let analysis = scripted_classifier().classify(&frame_with_pupil(150, 105)).unwrap();
    assert!(analysis.result.face_detected);
    assert_eq!(analysis.result.eye_count, 1);
    assert!(!analysis.result.looking_away);

    let eye = analysis.faces[0].eye.unwrap();
    assert_eq!(eye.bbox, BoundingBox::new(120, 90, 60, 30).unwrap());
    let pupil_x = eye.pupil_x.unwrap();
    assert!((pupil_x - 150.0).abs() < 2.0, "pupil_x = {}", pupil_x);
}

#[test]
fn test_rgb_frame_with_glance_to_side() {
    let analysis = scripted_classifier().classify(&frame_with_pupil(123, 105)).unwrap();
    assert!(analysis.result.face_detected);
    assert!(analysis.result.looking_away);
}

#[test]
fn test_without_models_every_frame_is_away() {
    let detector = RegionDetector::new(
        Box::new(NullDetector::new("face")),
        Box::new(NullDetector::new("eye")),
    );
    let classifier = GazeClassifier::new(detector, &GazeConfig::default()).unwrap();
    let analysis = classifier.classify(&frame_with_pupil(150, 105)).unwrap();
    assert!(!analysis.result.face_detected);
    assert!(analysis.result.looking_away);
}

#[test]
fn test_invalid_config_rejected() {
    let detector = RegionDetector::new(fixed(vec![]), fixed(vec![]));
    let config = GazeConfig {
        roi_margin: 0.7,
        ..Default::default()
    };
    assert!(matches!(
        GazeClassifier::new(detector, &config),
        Err(GazeError::Config(_))
    ));
}

proptest! {
    #[test]
    fn prop_no_face_always_away(seed in any::<u8>(), width in 8u32..64, height in 8u32..64) {
        let image = RgbImage::from_fn(width, height, |x, y| {
            let v = (x * 7 + y * 13 + seed as u32) as u8;
            Rgb([v, v.wrapping_mul(3), v.wrapping_add(40)])
        });
        let detector = RegionDetector::new(fixed(vec![]), fixed(vec![(0, 0, 4, 4)]));
        let classifier = GazeClassifier::new(detector, &GazeConfig::default()).unwrap();
        let analysis = classifier.classify(&VideoFrame::from_rgb_image(image, 0, 0)).unwrap();
        prop_assert!(analysis.result.looking_away);
        prop_assert_eq!(analysis.result.eye_count, 0);
    }

    #[test]
    fn prop_pupil_ratio_in_unit_range(px in 0i32..60, py in 0i32..30) {
        let mut image = RgbImage::from_pixel(320, 240, Rgb([200, 190, 180]));
        draw_filled_circle_mut(&mut image, (120 + px, 90 + py), 4, Rgb([10, 10, 10]));
        let analysis = scripted_classifier().classify(&VideoFrame::from_rgb_image(image, 0, 0)).unwrap();
        if let Some(ratio) = analysis.faces[0].eye.and_then(|e| e.pupil_ratio) {
            prop_assert!((0.0..=1.0).contains(&ratio));
        }
    }
}
