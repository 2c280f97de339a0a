use serde::{Deserialize, Serialize};

/// Occupancy classification for a single spot.
///
/// The set is closed. Anything the inference service reports outside of it is
/// dropped by the sanitizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpotStatus {
    Occupied,
    Vacant,
    Unknown,
}

impl SpotStatus {
    pub const ALL: [SpotStatus; 3] = [SpotStatus::Occupied, SpotStatus::Vacant, SpotStatus::Unknown];

    pub fn as_str(self) -> &'static str {
        match self {
            SpotStatus::Occupied => "OCCUPIED",
            SpotStatus::Vacant => "VACANT",
            SpotStatus::Unknown => "UNKNOWN",
        }
    }

    /// Exact match against the canonical upper-case names.
    ///
    /// Callers normalize first; this does not trim or fold case.
    pub fn from_canonical(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl std::fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sanitized per-spot classification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub spot_number: String,
    pub status: SpotStatus,
}

/// Envelope returned to the client for one detection request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub camera_id: String,
    pub spots: Vec<DetectionResult>,
    /// Unmodified inference output, kept for diagnostics.
    pub raw: String,
}
