//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `GAZE__<SECTION>__<KEY>` environment variables, then the plain
//! `HOST` and `PORT` variables.

use camera_capture::CameraConfig;
use config::{Config, Environment, File};
use gaze::GazeConfig;
use pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use stream::StreamConfig;

use crate::ApiError;

/// Default config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/gaze-monitor.toml";

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub gaze: GazeConfig,
    pub pipeline: PipelineConfig,
    pub stream: StreamConfig,
    pub logging: LoggingConfig,
    /// Start a tracking session as soon as the server boots
    pub auto_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            camera: CameraConfig::default(),
            gaze: GazeConfig::default(),
            pipeline: PipelineConfig::default(),
            stream: StreamConfig::default(),
            logging: LoggingConfig::default(),
            auto_start: true,
        }
    }
}

impl AppConfig {
    /// Load from `GAZE_CONFIG` (or the default path) plus the environment
    pub fn load() -> Result<Self, ApiError> {
        let path = std::env::var("GAZE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load from `path`, which may be missing, plus the environment
    pub fn load_from(path: &str) -> Result<Self, ApiError> {
        let config: AppConfig = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("GAZE").separator("__"))
            .set_override_option("server.host", std::env::var("HOST").ok())?
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?
            .try_deserialize()?;

        config.gaze.validate()?;
        Ok(config)
    }

    /// Listener address as `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::CameraBackend;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert!(config.auto_start);
        assert_eq!(config.pipeline.away_frame_threshold, 15);
        assert_eq!(config.stream.jpeg_quality, 70);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from("/definitely/not/here.toml").unwrap();
        assert_eq!(config.gaze.roi_margin, 0.2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
auto_start = false

[camera]
backend = "image_sequence"
device = "/srv/frames"

[gaze]
roi_margin = 0.25

[pipeline]
frame_interval_ms = 50
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert!(!config.auto_start);
        assert_eq!(config.camera.backend, CameraBackend::ImageSequence);
        assert_eq!(config.camera.device, "/srv/frames");
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.gaze.roi_margin, 0.25);
        assert_eq!(config.gaze.pupil_threshold, 50);
        assert_eq!(config.pipeline.frame_interval_ms, 50);
    }

    #[test]
    fn test_shipped_config_opens_without_camera_hardware() {
        use camera_capture::FrameSource;

        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let path = root.join(DEFAULT_CONFIG_PATH);
        let mut config = AppConfig::load_from(path.to_str().unwrap()).unwrap();
        assert!(config.auto_start);
        assert_eq!(config.camera.backend, CameraBackend::ImageSequence);

        // Relative to the workspace root, where the binary is normally run
        config.camera.device = root.join(&config.camera.device).to_string_lossy().into_owned();
        let mut source = camera_capture::open_source(&config.camera).unwrap();
        assert!(source.read_frame().is_ok());
    }

    #[test]
    fn test_invalid_gaze_config_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[gaze]\nroi_margin = 0.9").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path().to_str().unwrap()),
            Err(ApiError::Gaze(_))
        ));
    }
}
