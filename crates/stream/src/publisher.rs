//! Broadcast publisher

use alerting::AlertRaised;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gaze::GazeFrameResult;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::annotate::encode_jpeg;
use crate::event::{unix_timestamp, StreamEvent};
use crate::PublishError;

/// Publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Events buffered per viewer before the slowest viewer starts skipping
    pub channel_capacity: usize,
    /// JPEG quality for video frames (1-100)
    pub jpeg_quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
            jpeg_quality: 70,
        }
    }
}

/// Fan-out of stream events to every connected viewer.
///
/// Sending never blocks: with no viewers an event is dropped, and a viewer
/// that falls behind skips the events it missed.
#[derive(Clone)]
pub struct StreamPublisher {
    tx: broadcast::Sender<StreamEvent>,
    jpeg_quality: u8,
}

impl StreamPublisher {
    /// Create a publisher with no viewers
    pub fn new(config: &StreamConfig) -> Self {
        let (tx, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            tx,
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
        }
    }

    /// Send to all current viewers, returning how many received it
    pub fn emit(&self, event: StreamEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!("No viewers connected, dropping {} event", event.name());
                0
            }
        }
    }

    /// Encode and send an annotated frame. Skips encoding when nobody is watching.
    pub fn publish_frame(&self, frame: &RgbImage) -> Result<usize, PublishError> {
        if self.viewer_count() == 0 {
            return Ok(0);
        }
        let jpeg = encode_jpeg(frame, self.jpeg_quality)?;
        Ok(self.emit(StreamEvent::VideoFrame(STANDARD.encode(jpeg))))
    }

    /// Broadcast an alert event
    pub fn publish_alert(&self, alert: &AlertRaised) -> usize {
        self.emit(StreamEvent::Alert {
            message: alert.message.clone(),
            count: alert.attempt_number,
        })
    }

    /// Broadcast the per-frame gaze verdict
    pub fn publish_status(&self, result: &GazeFrameResult) -> usize {
        self.emit(StreamEvent::GazeStatus {
            face_detected: result.face_detected,
            eye_count: result.eye_count,
            looking_away: result.looking_away,
            timestamp: unix_timestamp(),
        })
    }

    /// New viewer, receiving events published from now on
    pub fn subscribe(&self) -> ViewerStream {
        ViewerStream {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of connected viewers
    pub fn viewer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One viewer's end of the broadcast
pub struct ViewerStream {
    rx: broadcast::Receiver<StreamEvent>,
}

impl ViewerStream {
    /// Next event, skipping over anything this viewer lagged behind on
    pub async fn next(&mut self) -> Result<StreamEvent, PublishError> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Viewer lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Err(PublishError::Closed),
            }
        }
    }
}
