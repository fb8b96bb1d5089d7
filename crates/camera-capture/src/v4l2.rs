//! Video4Linux2 webcam source

use std::time::Duration;

use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};
use tracing::{info, warn};

use crate::source::now_ns;
use crate::{CameraConfig, CameraError, FrameSource, VideoFrame};

const BUFFER_COUNT: u32 = 4;
/// Dequeue wait before a read reports `CameraError::Timeout`
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Memory-mapped V4L2 capture (MJPEG or YUYV)
pub struct V4l2Source {
    device_path: String,
    stream: Option<Stream<'static>>,
    fourcc: FourCC,
    width: u32,
    height: u32,
}

impl V4l2Source {
    /// Open the device and start streaming
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let open_err = |e: std::io::Error| CameraError::Open(format!("{}: {}", config.device, e));

        let device = Device::with_path(&config.device).map_err(open_err)?;

        let mut format = device.format().map_err(open_err)?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = FourCC::new(b"MJPG");
        let format = device.set_format(&format).map_err(open_err)?;

        if format.fourcc != FourCC::new(b"MJPG") && format.fourcc != FourCC::new(b"YUYV") {
            return Err(CameraError::Format(format!(
                "{}: unsupported pixel format {}",
                config.device, format.fourcc
            )));
        }

        let mut stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(open_err)?;
        stream.set_timeout(READ_TIMEOUT);

        info!(
            "V4L2 camera opened: {} {}x{} {}",
            config.device, format.width, format.height, format.fourcc
        );

        Ok(Self {
            device_path: config.device.clone(),
            stream: Some(stream),
            fourcc: format.fourcc,
            width: format.width,
            height: format.height,
        })
    }

    fn decode(&self, buf: &[u8]) -> Result<image::RgbImage, CameraError> {
        if self.fourcc == FourCC::new(b"MJPG") {
            let img = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)
                .map_err(|e| CameraError::Read(e.to_string()))?;
            Ok(img.to_rgb8())
        } else {
            yuyv_to_rgb(buf, self.width, self.height)
        }
    }
}

fn yuyv_to_rgb(buf: &[u8], width: u32, height: u32) -> Result<image::RgbImage, CameraError> {
    let expected = (width as usize) * (height as usize) * 2;
    if buf.len() < expected {
        return Err(CameraError::Read(format!(
            "short YUYV buffer: {} < {}",
            buf.len(),
            expected
        )));
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in buf[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0] as f32, chunk[1] as f32 - 128.0, chunk[2] as f32, chunk[3] as f32 - 128.0);
        for y in [y0, y1] {
            rgb.push((y + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }

    image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| CameraError::Format("YUYV conversion size mismatch".into()))
}

impl FrameSource for V4l2Source {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let stream = self.stream.as_mut().ok_or(CameraError::NotInitialized)?;
        let (buf, meta) = stream.next().map_err(CameraError::from_read_io)?;
        let sequence = meta.sequence;
        let owned = buf.to_vec();

        let image = self.decode(&owned)?;
        Ok(VideoFrame::from_rgb_image(image, now_ns(), sequence))
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            info!("V4L2 camera released: {}", self.device_path);
        } else {
            warn!("V4L2 camera {} already released", self.device_path);
        }
    }

    fn describe(&self) -> String {
        format!("v4l2 {}", self.device_path)
    }
}
