//! Gaze Monitor - Main Entry Point

use api::{init_logging, run_server, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("=== Gaze Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Camera: {:?} {}", config.camera.backend, config.camera.device);

    run_server(config).await
}
