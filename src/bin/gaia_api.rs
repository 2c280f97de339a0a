//! gaia_api - HTTP service for parking occupancy detection
//!
//! This daemon:
//! 1. Loads server configuration from GAIA_CONFIG and the environment
//! 2. Loads camera profiles (a broken profile document is fatal)
//! 3. Serves the detection API until Ctrl-C

use anyhow::{Context, Result};
use std::sync::{mpsc, Arc};

use gaia_parking::{
    api::{ApiConfig, ApiServer},
    config::ServerConfig,
    CameraStore, DetectionPipeline, GeminiBackend,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::load()?;
    log::debug!("server config: {:?}", config);

    let cameras = Arc::new(CameraStore::new(&config.camera_config_path));
    cameras
        .load()
        .with_context(|| format!("load camera profiles from {}", cameras.path().display()))?;

    if config.credential.is_none() {
        log::warn!("no inference credential set (GEMINI_API_KEY or API_KEY); detect requests will fail");
    }
    if !config.reference_image_path.exists() {
        log::warn!(
            "reference image not found at {}; detect requests will fail",
            config.reference_image_path.display()
        );
    }

    let backend = GeminiBackend::new(config.inference.clone())?;
    log::info!(
        "inference via {} (timeout {}s)",
        backend.endpoint(),
        config.inference.timeout.as_secs()
    );
    let pipeline = Arc::new(DetectionPipeline::new(
        cameras,
        config.reference_image_path.clone(),
        config.credential.clone(),
        Arc::new(backend),
    ));

    let api_config = ApiConfig {
        addr: config.api_addr.clone(),
        max_upload_bytes: config.max_upload_bytes,
        max_connections: config.max_connections,
        parking_map_path: config.parking_map_path.clone(),
    };
    let api_handle = ApiServer::new(api_config, pipeline).spawn()?;
    log::info!("parking api listening on {}", api_handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("set Ctrl-C handler")?;

    log::info!("gaia_api waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping API server...");
    api_handle.stop()?;

    Ok(())
}
