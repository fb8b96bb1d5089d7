//! Frame sources

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::{CameraError, VideoFrame};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// A camera-like producer of frames.
///
/// Implementations are owned by the capture worker for the whole session and
/// never shared between threads.
pub trait FrameSource {
    /// Block until the next frame is available
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Release the underlying device. Called once when the session ends.
    fn release(&mut self) {}

    /// Human readable description for logs
    fn describe(&self) -> String;

    /// Endless iterator over frame reads
    fn frames(&mut self) -> Frames<'_, Self>
    where
        Self: Sized,
    {
        Frames { source: self }
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        (**self).read_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Lazy, never-ending sequence of frame reads
pub struct Frames<'a, S: FrameSource> {
    source: &'a mut S,
}

impl<S: FrameSource> Iterator for Frames<'_, S> {
    type Item = Result<VideoFrame, CameraError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.source.read_frame())
    }
}

pub(crate) fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Replays the still images of a directory forever, in file name order
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    sequence: u32,
}

impl ImageSequenceSource {
    /// Scan `dir` for images
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CameraError> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "{}: no images found",
                dir.display()
            )));
        }

        info!("Image sequence opened: {} ({} images)", dir.display(), files.len());
        Ok(Self {
            dir,
            files,
            cursor: 0,
            sequence: 0,
        })
    }

    /// Number of images in the loop
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Always false once opened
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let path = &self.files[self.cursor];
        self.cursor = (self.cursor + 1) % self.files.len();
        self.sequence = self.sequence.wrapping_add(1);

        let image = image::open(path)
            .map_err(|e| CameraError::Read(format!("{}: {}", path.display(), e)))?;
        debug!("Replaying {}", path.display());

        Ok(VideoFrame::from_rgb_image(image.to_rgb8(), now_ns(), self.sequence))
    }

    fn release(&mut self) {
        debug!("Image sequence released: {}", self.dir.display());
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}
