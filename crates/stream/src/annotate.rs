//! Frame annotation and encoding

use gaze::{BoundingBox, FrameAnalysis, RegionOfInterest};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::PublishError;

const ROI_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const FACE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const IGNORED_FACE_COLOR: Rgb<u8> = Rgb([128, 128, 128]);
const EYE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const PUPIL_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const AWAY_COLOR: Rgb<u8> = Rgb([220, 0, 0]);
const AWAY_BORDER: u32 = 4;

fn rect(bbox: &BoundingBox) -> Rect {
    Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width, bbox.height)
}

/// Draw the region of interest and everything the classifier looked at
pub fn annotate(frame: &mut RgbImage, analysis: &FrameAnalysis, roi_margin: f32) {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    if let Some(roi) = RegionOfInterest::central(width, height, roi_margin).to_bbox() {
        draw_hollow_rect_mut(frame, rect(&roi), ROI_COLOR);
    }

    for face in &analysis.faces {
        let color = if face.in_roi { FACE_COLOR } else { IGNORED_FACE_COLOR };
        draw_hollow_rect_mut(frame, rect(&face.bbox), color);

        let Some(eye) = &face.eye else { continue };
        draw_hollow_rect_mut(frame, rect(&eye.bbox), EYE_COLOR);
        if let Some(pupil_x) = eye.pupil_x {
            let (_, cy) = eye.bbox.center();
            draw_filled_circle_mut(frame, (pupil_x as i32, cy as i32), 3, PUPIL_COLOR);
        }
    }

    if analysis.result.looking_away {
        for inset in 0..AWAY_BORDER.min(width / 2).min(height / 2) {
            let border = Rect::at(inset as i32, inset as i32)
                .of_size(width - 2 * inset, height - 2 * inset);
            draw_hollow_rect_mut(frame, border, AWAY_COLOR);
        }
    }
}

/// Encode an RGB frame as baseline JPEG
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, PublishError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(frame)
        .map_err(|e| PublishError::Encode(e.to_string()))?;
    Ok(buf)
}
