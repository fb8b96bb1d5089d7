//! Viewer Stream
//!
//! Annotated video frames, gaze status, and alerts pushed to connected viewers.

mod annotate;
mod event;
mod publisher;

pub use annotate::{annotate, encode_jpeg};
pub use event::{unix_timestamp, StreamEvent, ViewerCommand};
pub use publisher::{StreamConfig, StreamPublisher, ViewerStream};

use thiserror::Error;

/// Publishing errors
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Stream closed")]
    Closed,
}
