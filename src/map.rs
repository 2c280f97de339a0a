//! Parking map geometry.
//!
//! Spot polygons are given in reference-image pixel coordinates. The core
//! pipeline never reads this document; it feeds the overlay renderer and the
//! map endpoint.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PARKING_MAP_PATH: &str = "config/parking_map.json";

/// Image size assumed when the document carries no metadata.
pub const DEFAULT_MAP_WIDTH: f64 = 363.0;
pub const DEFAULT_MAP_HEIGHT: f64 = 899.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParkingMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MapMetadata>,
    pub spots: Vec<MapSpot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapMetadata {
    pub image_width: f64,
    pub image_height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapSpot {
    pub id: String,
    pub points: Vec<[f64; 2]>,
}

impl MapSpot {
    /// Vertex average. `None` for a polygon without points.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.points.is_empty() {
            return None;
        }
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0_f64, 0.0_f64), |(sx, sy), [x, y]| (sx + x, sy + y));
        Some((sx / n, sy / n))
    }
}

impl ParkingMap {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read parking map {}: {}", path.display(), e))?;
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid parking map {}: {}", path.display(), e))
    }

    /// (width, height) of the reference image the polygons refer to.
    pub fn dimensions(&self) -> (f64, f64) {
        match &self.metadata {
            Some(meta) if meta.image_width > 0.0 && meta.image_height > 0.0 => {
                (meta.image_width, meta.image_height)
            }
            _ => (DEFAULT_MAP_WIDTH, DEFAULT_MAP_HEIGHT),
        }
    }

    pub fn spot(&self, id: &str) -> Option<&MapSpot> {
        self.spots.iter().find(|spot| spot.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_document_with_metadata() {
        let map: ParkingMap = serde_json::from_str(
            r#"{
                "metadata": {"image_width": 400, "image_height": 800},
                "spots": [{"id": "A0", "points": [[0, 0], [10, 0], [10, 20], [0, 20]]}]
            }"#,
        )
        .unwrap();
        assert_eq!(map.dimensions(), (400.0, 800.0));
        assert_eq!(map.spot("A0").unwrap().centroid(), Some((5.0, 10.0)));
        assert!(map.spot("B1").is_none());
    }

    #[test]
    fn missing_metadata_uses_default_dimensions() {
        let map: ParkingMap = serde_json::from_str(r#"{"spots": []}"#).unwrap();
        assert_eq!(map.dimensions(), (DEFAULT_MAP_WIDTH, DEFAULT_MAP_HEIGHT));
    }

    #[test]
    fn empty_polygon_has_no_centroid() {
        let spot = MapSpot {
            id: "A0".to_string(),
            points: vec![],
        };
        assert!(spot.centroid().is_none());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ParkingMap::load(&dir.path().join("map.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read parking map"));
    }
}
