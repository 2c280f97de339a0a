use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use gaia_parking::config::ServerConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "GAIA_CONFIG",
        "GAIA_API_ADDR",
        "GAIA_INFERENCE_URL",
        "GAIA_INFERENCE_MODEL",
        "GAIA_INFERENCE_TIMEOUT_SECS",
        "GAIA_MAX_UPLOAD_BYTES",
        "GAIA_MAX_CONNECTIONS",
        "CAMERA_CONFIG_PATH",
        "REFERENCE_IMAGE_PATH",
        "PARKING_MAP_PATH",
        "GEMINI_API_KEY",
        "API_KEY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ServerConfig::load().expect("load config");

    assert_eq!(cfg.api_addr, "127.0.0.1:8788");
    assert_eq!(cfg.camera_config_path, PathBuf::from("config/cameras.json"));
    assert_eq!(
        cfg.reference_image_path,
        PathBuf::from("config/reference_labeled.png")
    );
    assert_eq!(cfg.parking_map_path, PathBuf::from("config/parking_map.json"));
    assert_eq!(cfg.inference.model, "gemini-2.5-pro");
    assert_eq!(cfg.inference.timeout.as_secs(), 120);
    assert_eq!(cfg.max_upload_bytes, 20 * 1024 * 1024);
    assert_eq!(cfg.max_connections, 64);
    assert!(cfg.credential.is_none());
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "api": {"addr": "0.0.0.0:9000", "max_upload_bytes": 1048576, "max_connections": 8},
        "paths": {
            "camera_config": "/srv/gaia/cameras.json",
            "reference_image": "/srv/gaia/reference.jpg",
            "parking_map": "/srv/gaia/map.json"
        },
        "inference": {
            "base_url": "http://127.0.0.1:9100",
            "model": "gemini-2.5-flash",
            "timeout_secs": 30
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("GAIA_CONFIG", file.path());
    std::env::set_var("REFERENCE_IMAGE_PATH", "/data/reference_labeled.png");
    std::env::set_var("GAIA_INFERENCE_TIMEOUT_SECS", "45");
    std::env::set_var("API_KEY", "fallback-key");
    std::env::set_var("GAIA_MAX_CONNECTIONS", "16");

    let cfg = ServerConfig::load().expect("load config");

    assert_eq!(cfg.api_addr, "0.0.0.0:9000");
    assert_eq!(cfg.max_upload_bytes, 1_048_576);
    assert_eq!(cfg.max_connections, 16);
    assert_eq!(cfg.camera_config_path, PathBuf::from("/srv/gaia/cameras.json"));
    assert_eq!(
        cfg.reference_image_path,
        PathBuf::from("/data/reference_labeled.png")
    );
    assert_eq!(cfg.parking_map_path, PathBuf::from("/srv/gaia/map.json"));
    assert_eq!(cfg.inference.base_url, "http://127.0.0.1:9100");
    assert_eq!(cfg.inference.model, "gemini-2.5-flash");
    assert_eq!(cfg.inference.timeout.as_secs(), 45);
    assert_eq!(cfg.credential.as_deref(), Some("fallback-key"));

    clear_env();
}

#[test]
fn gemini_key_takes_precedence_and_is_redacted() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("GEMINI_API_KEY", "primary-secret");
    std::env::set_var("API_KEY", "fallback-secret");

    let cfg = ServerConfig::load().expect("load config");
    assert_eq!(cfg.credential.as_deref(), Some("primary-secret"));
    let debug = format!("{:?}", cfg);
    assert!(!debug.contains("primary-secret"));
    assert!(debug.contains("<redacted>"));

    clear_env();
}

#[test]
fn blank_credential_counts_as_missing() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("GEMINI_API_KEY", "   ");
    let cfg = ServerConfig::load().expect("load config");
    assert!(cfg.credential.is_none());

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("GAIA_INFERENCE_TIMEOUT_SECS", "soon");
    assert!(ServerConfig::load().is_err());
    clear_env();

    std::env::set_var("GAIA_INFERENCE_TIMEOUT_SECS", "0");
    assert!(ServerConfig::load().is_err());
    clear_env();

    std::env::set_var("GAIA_MAX_CONNECTIONS", "0");
    assert!(ServerConfig::load().is_err());
    clear_env();

    std::env::set_var("GAIA_INFERENCE_URL", "not a url");
    assert!(ServerConfig::load().is_err());
    clear_env();

    std::env::set_var("GAIA_CONFIG", "/nonexistent/gaia.json");
    let err = ServerConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
    clear_env();
}
