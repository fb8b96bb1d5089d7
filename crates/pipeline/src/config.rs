//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Session timing and persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause between capture iterations (default: 100ms, ~10 fps)
    pub frame_interval_ms: u64,
    /// Upper bound on waiting for the worker to exit during stop
    pub stop_timeout_ms: u64,
    /// Upper bound on waiting for the capture device to open during start
    pub open_timeout_ms: u64,
    /// Away frames tolerated before an alert (default: 15)
    pub away_frame_threshold: u32,
    /// Append-only cheating attempt log
    pub attempt_log_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 100,
            stop_timeout_ms: 2000,
            open_timeout_ms: 5000,
            away_frame_threshold: 15,
            attempt_log_path: PathBuf::from(storage::DEFAULT_LOG_PATH),
        }
    }
}

impl PipelineConfig {
    /// Pause between capture iterations
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Bound on the stop wait
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Bound on the start handshake
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.frame_interval(), Duration::from_millis(100));
        assert_eq!(config.away_frame_threshold, 15);
        assert!(config.stop_timeout() < config.open_timeout());
    }
}
