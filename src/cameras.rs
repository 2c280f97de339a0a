//! Camera profile store.
//!
//! Camera profiles live in one JSON document keyed by camera key:
//!
//! ```json
//! { "north_lot": { "camera_id": "cam-01", "visible_spots": ["A0", "A1"], "alignment_hint": "..." } }
//! ```
//!
//! Profiles keep the order they have in the document; the first one is the
//! default camera offered to clients.
//!
//! The document is read once. The first successful load is cached for the
//! lifetime of the store and every later call is served from the cache. A
//! failed load is not cached, so the next call reads the source again.

use anyhow::{anyhow, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

pub const DEFAULT_CAMERA_CONFIG_PATH: &str = "config/cameras.json";

/// One camera profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub camera_id: String,
    /// Allow-list of spot identifiers this camera may report, in display order.
    pub visible_spots: Vec<String>,
    /// Free text describing the camera perspective relative to the reference map.
    pub alignment_hint: String,
}

impl CameraConfig {
    /// Borrowed allow-list for the sanitizer.
    pub fn allowed_spots(&self) -> HashSet<&str> {
        self.visible_spots.iter().map(String::as_str).collect()
    }
}

/// Camera key to profile, iterated in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CameraConfigs {
    entries: Vec<(String, CameraConfig)>,
}

impl CameraConfigs {
    pub fn get(&self, key: &str) -> Option<&CameraConfig> {
        self.entries
            .iter()
            .find(|(entry_key, _)| entry_key == key)
            .map(|(_, cfg)| cfg)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CameraConfig)> {
        self.entries.iter().map(|(key, cfg)| (key.as_str(), cfg))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for CameraConfigs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ConfigsVisitor;

        impl<'de> Visitor<'de> for ConfigsVisitor {
            type Value = CameraConfigs;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of camera key to camera profile")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<CameraConfigs, A::Error> {
                let mut entries: Vec<(String, CameraConfig)> = Vec::new();
                while let Some((key, cfg)) = map.next_entry::<String, CameraConfig>()? {
                    // A repeated key keeps its first position and its last value.
                    match entries.iter_mut().find(|(existing, _)| *existing == key) {
                        Some(entry) => entry.1 = cfg,
                        None => entries.push((key, cfg)),
                    }
                }
                Ok(CameraConfigs { entries })
            }
        }

        deserializer.deserialize_map(ConfigsVisitor)
    }
}

/// Lazily loaded, read-only camera profile store.
#[derive(Debug)]
pub struct CameraStore {
    path: PathBuf,
    cache: OnceLock<Arc<CameraConfigs>>,
    init: Mutex<()>,
}

impl CameraStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the cached profiles, loading them on first use.
    ///
    /// Concurrent first callers serialize on the init guard so the source is
    /// read at most once per successful load.
    pub fn load(&self) -> Result<Arc<CameraConfigs>> {
        if let Some(configs) = self.cache.get() {
            return Ok(configs.clone());
        }

        let _guard = self
            .init
            .lock()
            .map_err(|_| anyhow!("camera store init lock poisoned"))?;
        if let Some(configs) = self.cache.get() {
            return Ok(configs.clone());
        }

        let configs = Arc::new(read_camera_configs(&self.path)?);
        log::info!(
            "loaded {} camera profile(s) from {}",
            configs.len(),
            self.path.display()
        );
        let _ = self.cache.set(configs.clone());
        Ok(configs)
    }

    /// Look up one profile by camera key.
    pub fn get(&self, key: &str) -> Result<Option<CameraConfig>> {
        Ok(self.load()?.get(key).cloned())
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }
}

fn read_camera_configs(path: &Path) -> Result<CameraConfigs> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read camera config {}: {}", path.display(), e))?;
    let configs: CameraConfigs = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid camera config {}: {}", path.display(), e))?;
    for (key, cfg) in configs.iter() {
        warn_duplicate_spots(key, cfg);
    }
    Ok(configs)
}

fn warn_duplicate_spots(key: &str, cfg: &CameraConfig) {
    let mut seen = HashSet::new();
    for spot in &cfg.visible_spots {
        if !seen.insert(spot.as_str()) {
            log::warn!("camera '{}' lists spot '{}' more than once", key, spot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CAMERAS: &str = r#"{
        "south": {
            "camera_id": "cam-south",
            "visible_spots": ["B1", "B2"],
            "alignment_hint": "Camera faces north from the south fence."
        },
        "north": {
            "camera_id": "cam-north",
            "visible_spots": ["A0", "A1", "A2"],
            "alignment_hint": "Row A runs left to right."
        }
    }"#;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp camera config");
        file.write_all(contents.as_bytes()).expect("write camera config");
        file
    }

    #[test]
    fn get_returns_profile_by_key() {
        let file = write_config(CAMERAS);
        let store = CameraStore::new(file.path());
        let cfg = store.get("north").unwrap().expect("north profile");
        assert_eq!(cfg.camera_id, "cam-north");
        assert_eq!(cfg.visible_spots, vec!["A0", "A1", "A2"]);
        assert_eq!(cfg.alignment_hint, "Row A runs left to right.");
        assert!(store.get("east").unwrap().is_none());
    }

    #[test]
    fn keys_iterate_in_document_order() {
        let file = write_config(CAMERAS);
        let store = CameraStore::new(file.path());
        let configs = store.load().unwrap();
        let keys: Vec<_> = configs.keys().collect();
        assert_eq!(keys, vec!["south", "north"]);
    }

    #[test]
    fn repeated_key_keeps_first_position_and_last_value() {
        let file = write_config(
            r#"{
                "b": {"camera_id": "cam-b1", "visible_spots": [], "alignment_hint": ""},
                "a": {"camera_id": "cam-a", "visible_spots": [], "alignment_hint": ""},
                "b": {"camera_id": "cam-b2", "visible_spots": [], "alignment_hint": ""}
            }"#,
        );
        let store = CameraStore::new(file.path());
        let configs = store.load().unwrap();
        let keys: Vec<_> = configs.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(configs.get("b").unwrap().camera_id, "cam-b2");
    }

    #[test]
    fn non_object_document_is_an_error() {
        let file = write_config(r#"["north"]"#);
        let store = CameraStore::new(file.path());
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("invalid camera config"));
    }

    #[test]
    fn second_load_is_served_from_cache() {
        let file = write_config(CAMERAS);
        let path = file.path().to_path_buf();
        let store = CameraStore::new(&path);

        let first = store.load().unwrap();
        assert!(store.is_loaded());
        drop(file);
        assert!(!path.exists());

        let second = store.load().unwrap();
        assert_eq!(*first, *second);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_source_is_an_error_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.json");
        let store = CameraStore::new(&path);

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("failed to read camera config"));
        assert!(!store.is_loaded());

        std::fs::write(&path, CAMERAS).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn malformed_source_is_an_error() {
        let file = write_config(r#"{"north": {"camera_id": "cam-north"}}"#);
        let store = CameraStore::new(file.path());
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("invalid camera config"));
    }

    #[test]
    fn concurrent_first_access_shares_one_load() {
        let file = write_config(CAMERAS);
        let store = Arc::new(CameraStore::new(file.path()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.load().unwrap())
            })
            .collect();
        let loaded: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for configs in &loaded[1..] {
            assert!(Arc::ptr_eq(&loaded[0], configs));
        }
    }

    #[test]
    fn allowed_spots_borrows_visible_spots() {
        let cfg = CameraConfig {
            camera_id: "cam".to_string(),
            visible_spots: vec!["A0".to_string(), "A1".to_string()],
            alignment_hint: String::new(),
        };
        let allowed = cfg.allowed_spots();
        assert!(allowed.contains("A0"));
        assert!(allowed.contains("A1"));
        assert!(!allowed.contains("a0"));
    }
}
