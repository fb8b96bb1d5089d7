//! Video frame types and conversions

use image::{GrayImage, RgbImage};

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap a decoded RGB image
    pub fn from_rgb_image(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data
            .get(idx..idx + 3)
            .map(|px| [px[0], px[1], px[2]])
    }

    /// Convert to a single-channel luminance image
    pub fn to_grayscale(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b] = self.get_pixel(x, y).unwrap_or([0, 0, 0]);
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let luma = r as f32 * 0.299 + g as f32 * 0.587 + b as f32 * 0.114;
            image::Luma([luma.round().min(255.0) as u8])
        })
    }

    /// Copy into an `RgbImage`, `None` if the buffer does not match the dimensions
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Check the buffer length against the dimensions
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == (self.width as usize) * (self.height as usize) * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> VideoFrame {
        let data = rgb.iter().copied().cycle().take((width * height * 3) as usize).collect();
        VideoFrame::new(data, width, height, 0, 0)
    }

    #[test]
    fn test_grayscale_luminance() {
        let white = solid(4, 3, [255, 255, 255]).to_grayscale();
        assert_eq!(white.dimensions(), (4, 3));
        assert!(white.pixels().all(|p| p[0] == 255));

        let red = solid(2, 2, [255, 0, 0]).to_grayscale();
        assert_eq!(red.get_pixel(0, 0)[0], 76);
    }

    #[test]
    fn test_get_pixel_bounds() {
        let frame = solid(2, 2, [1, 2, 3]);
        assert_eq!(frame.get_pixel(1, 1), Some([1, 2, 3]));
        assert_eq!(frame.get_pixel(2, 0), None);
    }

    #[test]
    fn test_well_formed() {
        assert!(solid(3, 3, [0, 0, 0]).is_well_formed());
        let truncated = VideoFrame::new(vec![0; 5], 3, 3, 0, 0);
        assert!(!truncated.is_well_formed());
        assert!(truncated.to_rgb_image().is_none());
    }
}
