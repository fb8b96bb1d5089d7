//! ONNX-backed detector using tract

use std::path::Path;

use image::imageops::{self, FilterType};
use image::GrayImage;
use tract_onnx::prelude::*;
use tracing::debug;

use crate::detector::{group_detections, BoundingBox, Detection, ObjectDetector};
use crate::{DetectorConfig, GazeError};

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Values per output row: x1, y1, x2, y2, score (coordinates normalised to [0, 1])
const ROW_LEN: usize = 5;

/// Detector running a single-input, single-output ONNX model.
///
/// Input is `[1, 1, H, W]` grayscale scaled to [0, 1]; output is any tensor
/// whose last axis holds `ROW_LEN` values per candidate.
pub struct OnnxDetector {
    plan: OnnxPlan,
    input_width: u32,
    input_height: u32,
    score_threshold: f32,
    min_neighbors: u32,
    min_size: u32,
}

impl OnnxDetector {
    /// Load and optimise the model at `path`
    pub fn load(path: &Path, config: &DetectorConfig) -> Result<Self, GazeError> {
        let shape = [1, 1, config.input_height as usize, config.input_width as usize];
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact(shape).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| GazeError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            plan,
            input_width: config.input_width,
            input_height: config.input_height,
            score_threshold: config.score_threshold,
            min_neighbors: config.min_neighbors,
            min_size: config.min_size,
        })
    }

    fn infer(&self, gray: &GrayImage) -> Result<Vec<f32>, GazeError> {
        let resized = imageops::resize(gray, self.input_width, self.input_height, FilterType::Triangle);
        let input: Tensor = tract_ndarray::Array4::<f32>::from_shape_fn(
            (1, 1, self.input_height as usize, self.input_width as usize),
            |(_, _, y, x)| resized.get_pixel(x as u32, y as u32)[0] as f32 / 255.0,
        )
        .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| GazeError::Inference(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| GazeError::Inference("model produced no outputs".into()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| GazeError::Inference(e.to_string()))?;

        if view.shape().last() != Some(&ROW_LEN) {
            return Err(GazeError::Inference(format!(
                "unexpected output shape {:?}, last axis must be {}",
                view.shape(),
                ROW_LEN
            )));
        }
        Ok(view.iter().copied().collect())
    }
}

impl ObjectDetector for OnnxDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<Detection>, GazeError> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let raw = self.infer(gray)?;
        let candidates: Vec<Detection> = raw
            .chunks_exact(ROW_LEN)
            .filter(|row| row[4] >= self.score_threshold)
            .filter_map(|row| {
                let x1 = (row[0].clamp(0.0, 1.0) * width as f32) as u32;
                let y1 = (row[1].clamp(0.0, 1.0) * height as f32) as u32;
                let x2 = (row[2].clamp(0.0, 1.0) * width as f32) as u32;
                let y2 = (row[3].clamp(0.0, 1.0) * height as f32) as u32;
                BoundingBox::new(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1))
                    .map(|bbox| Detection { bbox, score: row[4] })
            })
            .collect();

        let min_w = self.min_size * width / self.input_width.max(1);
        let min_h = self.min_size * height / self.input_height.max(1);
        let grouped: Vec<Detection> = group_detections(candidates, self.min_neighbors)
            .into_iter()
            .filter(|d| d.bbox.width >= min_w && d.bbox.height >= min_h)
            .collect();

        debug!("ONNX detector kept {} boxes", grouped.len());
        Ok(grouped)
    }
}
