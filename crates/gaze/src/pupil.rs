//! Pupil localisation inside an eye region
//!
//! The pupil is the darkest blob of the eye: equalise, inverse-threshold,
//! clean the mask with a small opening, then take the centroid of the largest
//! external contour.

use image::{imageops, GrayImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::{equalize_histogram, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate_mut, erode_mut};

/// Default intensity cutoff after equalisation
pub const DEFAULT_PUPIL_THRESHOLD: u8 = 50;

const ERODE_ITERATIONS: usize = 2;
const DILATE_ITERATIONS: usize = 1;

/// Zeroth and first-order x moments of a closed polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourMoments {
    pub m00: f64,
    pub m10: f64,
}

impl ContourMoments {
    /// Green's theorem over the contour points, treated as a closed polygon.
    /// Orientation is normalised so `m00` is the (non-negative) area.
    pub fn of(contour: &Contour<i32>) -> Self {
        let points = &contour.points;
        if points.len() < 3 {
            return Self { m00: 0.0, m10: 0.0 };
        }

        let (mut a, mut mx) = (0.0f64, 0.0f64);
        for (i, p) in points.iter().enumerate() {
            let q = &points[(i + 1) % points.len()];
            let (x0, y0, x1, y1) = (p.x as f64, p.y as f64, q.x as f64, q.y as f64);
            let cross = x0 * y1 - x1 * y0;
            a += cross;
            mx += (x0 + x1) * cross;
        }

        let sign = if a < 0.0 { -1.0 } else { 1.0 };
        Self {
            m00: sign * a / 2.0,
            m10: sign * mx / 6.0,
        }
    }

    /// `M10 / M00`, `None` for degenerate contours
    pub fn centroid_x(&self) -> Option<f32> {
        (self.m00 > 0.0).then(|| (self.m10 / self.m00) as f32)
    }
}

/// Estimates the pupil's horizontal position in an eye image
#[derive(Debug, Clone, Copy)]
pub struct PupilEstimator {
    threshold: u8,
}

impl Default for PupilEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_PUPIL_THRESHOLD)
    }
}

impl PupilEstimator {
    /// Create an estimator with the given inverse-threshold cutoff
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    /// Binary pupil mask: white where the eye is darker than the cutoff
    pub fn pupil_mask(&self, eye: &GrayImage) -> GrayImage {
        let equalized = equalize_histogram(eye);
        let mut mask = threshold(&equalized, self.threshold, ThresholdType::BinaryInverted);
        for _ in 0..ERODE_ITERATIONS {
            erode_mut(&mut mask, Norm::LInf, 1);
        }
        for _ in 0..DILATE_ITERATIONS {
            dilate_mut(&mut mask, Norm::LInf, 1);
        }
        mask
    }

    /// Pupil centre x in eye-local pixels, `None` if no usable blob exists
    pub fn estimate(&self, eye: &GrayImage) -> Option<f32> {
        if eye.width() == 0 || eye.height() == 0 {
            return None;
        }

        // Blobs touching the image edge only trace as outer borders with a
        // background ring around them
        let mask = self.pupil_mask(eye);
        let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
        imageops::replace(&mut padded, &mask, 1, 1);

        find_contours::<i32>(&padded)
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(ContourMoments::of)
            .max_by(|a, b| a.m00.total_cmp(&b.m00))
            .and_then(|m| m.centroid_x())
            .map(|cx| cx - 1.0)
    }

    /// Pupil position normalised to the eye width
    pub fn offset_ratio(&self, eye: &GrayImage) -> Option<f32> {
        let width = eye.width() as f32;
        self.estimate(eye).map(|cx| (cx / width).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::point::Point;
    use imageproc::rect::Rect;

    fn eye_with_pupil(cx: i32, cy: i32, radius: i32) -> GrayImage {
        let mut eye = GrayImage::from_pixel(60, 40, Luma([220]));
        draw_filled_circle_mut(&mut eye, (cx, cy), radius, Luma([10]));
        eye
    }

    fn square(x0: i32, y0: i32, side: i32) -> Contour<i32> {
        Contour {
            points: vec![
                Point::new(x0, y0),
                Point::new(x0 + side, y0),
                Point::new(x0 + side, y0 + side),
                Point::new(x0, y0 + side),
            ],
            border_type: BorderType::Outer,
            parent: None,
        }
    }

    #[test]
    fn test_square_moments() {
        let m = ContourMoments::of(&square(10, 0, 4));
        assert_eq!(m.m00, 16.0);
        assert_eq!(m.centroid_x(), Some(12.0));

        let mut reversed = square(10, 0, 4);
        reversed.points.reverse();
        assert_eq!(ContourMoments::of(&reversed).centroid_x(), Some(12.0));
    }

    #[test]
    fn test_degenerate_contour_has_no_centroid() {
        let line = Contour {
            points: vec![Point::new(0, 0), Point::new(5, 0), Point::new(9, 0)],
            border_type: BorderType::Outer,
            parent: None,
        };
        assert_eq!(ContourMoments::of(&line).centroid_x(), None);
    }

    #[test]
    fn test_finds_centered_pupil() {
        let estimator = PupilEstimator::default();
        let cx = estimator.estimate(&eye_with_pupil(30, 20, 5)).unwrap();
        assert!((cx - 30.0).abs() < 1.5, "cx = {}", cx);
        let ratio = estimator.offset_ratio(&eye_with_pupil(30, 20, 5)).unwrap();
        assert!(ratio > 0.4 && ratio < 0.6);
    }

    #[test]
    fn test_finds_pupil_near_edge() {
        let estimator = PupilEstimator::default();
        let ratio = estimator.offset_ratio(&eye_with_pupil(5, 20, 4)).unwrap();
        assert!(ratio < 0.15, "ratio = {}", ratio);
    }

    fn eye_with_block(x: i32, y: i32, width: u32, height: u32) -> GrayImage {
        let mut eye = GrayImage::from_pixel(40, 20, Luma([220]));
        draw_filled_rect_mut(&mut eye, Rect::at(x, y).of_size(width, height), Luma([10]));
        eye
    }

    #[test]
    fn test_pupil_touching_either_edge_is_found() {
        let estimator = PupilEstimator::default();
        let left = estimator.offset_ratio(&eye_with_block(0, 6, 12, 8)).unwrap();
        let right = estimator.offset_ratio(&eye_with_block(28, 6, 12, 8)).unwrap();

        assert!(left > 0.1 && left < 0.9, "left = {}", left);
        assert!(right > 0.1 && right < 0.9, "right = {}", right);
        // Mirror images give mirrored centroids
        let left_cx = left * 40.0;
        let right_cx = right * 40.0;
        assert!((left_cx + right_cx - 39.0).abs() < 0.01, "{} + {}", left_cx, right_cx);
    }

    #[test]
    fn test_uniform_eye_not_found() {
        let estimator = PupilEstimator::default();
        assert_eq!(estimator.estimate(&GrayImage::from_pixel(40, 30, Luma([180]))), None);
    }

    #[test]
    fn test_speckle_noise_not_found() {
        let mut eye = GrayImage::from_pixel(40, 30, Luma([220]));
        eye.put_pixel(10, 10, Luma([0]));
        eye.put_pixel(25, 12, Luma([0]));
        eye.put_pixel(30, 20, Luma([0]));
        assert_eq!(PupilEstimator::default().estimate(&eye), None);
    }

    #[test]
    fn test_empty_image() {
        assert_eq!(PupilEstimator::default().estimate(&GrayImage::new(0, 0)), None);
    }
}
