//! Storage Layer
//!
//! Persists cheating attempts to an append-only text log.

mod attempt_log;

pub use attempt_log::{AttemptLog, DEFAULT_LOG_PATH};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Lock error: {0}")]
    Lock(String),
}
