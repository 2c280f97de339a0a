use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cameras::DEFAULT_CAMERA_CONFIG_PATH;
use crate::inference::backends::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::inference::GeminiConfig;
use crate::map::DEFAULT_PARKING_MAP_PATH;
use crate::media::DEFAULT_REFERENCE_IMAGE_PATH;

const DEFAULT_API_ADDR: &str = "127.0.0.1:8788";
const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Credential variables, in lookup order.
pub const CREDENTIAL_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Deserialize, Default)]
struct ServerConfigFile {
    api: Option<ApiConfigFile>,
    paths: Option<PathsConfigFile>,
    inference: Option<InferenceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
    max_upload_bytes: Option<usize>,
    max_connections: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct PathsConfigFile {
    camera_config: Option<PathBuf>,
    reference_image: Option<PathBuf>,
    parking_map: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct InferenceConfigFile {
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub api_addr: String,
    pub max_upload_bytes: usize,
    /// Concurrent connection handlers; extra connections get 503.
    pub max_connections: usize,
    pub camera_config_path: PathBuf,
    pub reference_image_path: PathBuf,
    pub parking_map_path: PathBuf,
    pub inference: GeminiConfig,
    /// Never read from the config file; environment only.
    pub credential: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("api_addr", &self.api_addr)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_connections", &self.max_connections)
            .field("camera_config_path", &self.camera_config_path)
            .field("reference_image_path", &self.reference_image_path)
            .field("parking_map_path", &self.parking_map_path)
            .field("inference", &self.inference)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("GAIA_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ServerConfigFile) -> Self {
        let api = file.api.unwrap_or_default();
        let paths = file.paths.unwrap_or_default();
        let inference = file.inference.unwrap_or_default();
        Self {
            api_addr: api.addr.unwrap_or_else(|| DEFAULT_API_ADDR.to_string()),
            max_upload_bytes: api.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            max_connections: api.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
            camera_config_path: paths
                .camera_config
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CAMERA_CONFIG_PATH)),
            reference_image_path: paths
                .reference_image
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REFERENCE_IMAGE_PATH)),
            parking_map_path: paths
                .parking_map
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PARKING_MAP_PATH)),
            inference: GeminiConfig {
                base_url: inference
                    .base_url
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                model: inference.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout: Duration::from_secs(
                    inference
                        .timeout_secs
                        .unwrap_or(DEFAULT_INFERENCE_TIMEOUT_SECS),
                ),
            },
            credential: None,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(addr) = non_empty_env("GAIA_API_ADDR") {
            self.api_addr = addr;
        }
        if let Some(path) = non_empty_env("CAMERA_CONFIG_PATH") {
            self.camera_config_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("REFERENCE_IMAGE_PATH") {
            self.reference_image_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("PARKING_MAP_PATH") {
            self.parking_map_path = PathBuf::from(path);
        }
        if let Some(url) = non_empty_env("GAIA_INFERENCE_URL") {
            self.inference.base_url = url;
        }
        if let Some(model) = non_empty_env("GAIA_INFERENCE_MODEL") {
            self.inference.model = model;
        }
        if let Some(timeout) = non_empty_env("GAIA_INFERENCE_TIMEOUT_SECS") {
            let seconds: u64 = timeout.parse().map_err(|_| {
                anyhow!("GAIA_INFERENCE_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.inference.timeout = Duration::from_secs(seconds);
        }
        if let Some(limit) = non_empty_env("GAIA_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = limit
                .parse()
                .map_err(|_| anyhow!("GAIA_MAX_UPLOAD_BYTES must be an integer byte count"))?;
        }
        if let Some(limit) = non_empty_env("GAIA_MAX_CONNECTIONS") {
            self.max_connections = limit
                .parse()
                .map_err(|_| anyhow!("GAIA_MAX_CONNECTIONS must be an integer connection count"))?;
        }
        self.credential = credential_from_env();
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.inference.timeout.as_secs() == 0 {
            return Err(anyhow!("inference timeout must be greater than zero"));
        }
        if self.max_upload_bytes == 0 {
            return Err(anyhow!("max upload size must be greater than zero"));
        }
        if self.max_connections == 0 {
            return Err(anyhow!("max connections must be greater than zero"));
        }
        Url::parse(&self.inference.base_url).map_err(|e| {
            anyhow!(
                "invalid inference base url '{}': {}",
                self.inference.base_url,
                e
            )
        })?;
        Ok(())
    }
}

/// First non-empty credential variable, if any.
pub fn credential_from_env() -> Option<String> {
    CREDENTIAL_VARS.iter().find_map(|key| non_empty_env(key))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<ServerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
