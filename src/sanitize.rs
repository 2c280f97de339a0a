//! Sanitization of free-form inference output.
//!
//! The inference service is untrusted: its text may be malformed JSON, a
//! different shape than requested, or mention spots the camera cannot see.
//! Everything here is lenient. Bad input never becomes an error; the
//! well-formed subset is kept and the rest is dropped silently.

use std::collections::HashSet;

use serde_json::Value;

use crate::detect::{DetectionResult, SpotStatus};

/// Parse `raw` and keep only entries whose spot is in `allowed_spots` and
/// whose status is one of the three known values.
///
/// - Non-JSON or non-array input yields an empty list.
/// - Non-object array elements are skipped.
/// - Missing or non-string `spot_number` / `status` fields read as `""`.
/// - `spot_number` is trimmed; `status` is trimmed and upper-cased.
/// - Spot matching is exact and case-sensitive.
/// - Relative order is preserved. Repeated spots are not collapsed.
pub fn sanitize(raw: &str, allowed_spots: &HashSet<&str>) -> Vec<DetectionResult> {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            log::debug!("inference output is not json: {}", err);
            return Vec::new();
        }
    };

    let Value::Array(entries) = parsed else {
        log::debug!("inference output is not a json array");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| sanitize_entry(entry, allowed_spots))
        .collect()
}

fn sanitize_entry(entry: &Value, allowed_spots: &HashSet<&str>) -> Option<DetectionResult> {
    let fields = entry.as_object()?;
    let spot_number = string_field(fields.get("spot_number")).trim();
    let status = string_field(fields.get("status")).trim().to_uppercase();

    if !allowed_spots.contains(spot_number) {
        return None;
    }
    let status = SpotStatus::from_canonical(&status)?;
    Some(DetectionResult {
        spot_number: spot_number.to_string(),
        status,
    })
}

fn string_field(value: Option<&Value>) -> &str {
    value.and_then(Value::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(spots: &[&'static str]) -> HashSet<&'static str> {
        spots.iter().copied().collect()
    }

    fn spot(spot_number: &str, status: SpotStatus) -> DetectionResult {
        DetectionResult {
            spot_number: spot_number.to_string(),
            status,
        }
    }

    #[test]
    fn drops_spots_outside_allow_list() {
        let raw = r#"[{"spot_number":"A0","status":"OCCUPIED"},{"spot_number":"C9","status":"VACANT"}]"#;
        let out = sanitize(raw, &allow(&["A0", "A1"]));
        assert_eq!(out, vec![spot("A0", SpotStatus::Occupied)]);
    }

    #[test]
    fn preserves_input_order() {
        let raw = r#"[{"spot_number":"B2","status":"VACANT"},{"spot_number":"A0","status":"OCCUPIED"}]"#;
        let out = sanitize(raw, &allow(&["A0", "B2"]));
        assert_eq!(
            out,
            vec![spot("B2", SpotStatus::Vacant), spot("A0", SpotStatus::Occupied)]
        );
    }

    #[test]
    fn status_is_case_and_whitespace_insensitive() {
        for status in ["vacant", "Vacant", " VACANT "] {
            let raw = format!(r#"[{{"spot_number":"A0","status":"{status}"}}]"#);
            let out = sanitize(&raw, &allow(&["A0"]));
            assert_eq!(out, vec![spot("A0", SpotStatus::Vacant)], "status {status:?}");
        }
    }

    #[test]
    fn spot_number_is_trimmed_but_case_sensitive() {
        let raw = r#"[{"spot_number":"  A0 ","status":"UNKNOWN"},{"spot_number":"a0","status":"UNKNOWN"}]"#;
        let out = sanitize(raw, &allow(&["A0"]));
        assert_eq!(out, vec![spot("A0", SpotStatus::Unknown)]);
    }

    #[test]
    fn non_json_yields_empty() {
        assert!(sanitize("not json", &allow(&["A0"])).is_empty());
        assert!(sanitize("", &allow(&["A0"])).is_empty());
        assert!(sanitize("[{\"spot_number\":", &allow(&["A0"])).is_empty());
    }

    #[test]
    fn non_array_yields_empty() {
        let raw = r#"{"spot_number":"A0","status":"OCCUPIED"}"#;
        assert!(sanitize(raw, &allow(&["A0"])).is_empty());
        assert!(sanitize("42", &allow(&["A0"])).is_empty());
        assert!(sanitize("null", &allow(&["A0"])).is_empty());
    }

    #[test]
    fn empty_array_yields_empty() {
        assert!(sanitize("[]", &allow(&["A0"])).is_empty());
    }

    #[test]
    fn primitives_are_skipped_and_objects_still_evaluated() {
        let raw = r#"[1, "A0", null, true, [], {"spot_number":"A1","status":"occupied"}]"#;
        let out = sanitize(raw, &allow(&["A0", "A1"]));
        assert_eq!(out, vec![spot("A1", SpotStatus::Occupied)]);
    }

    #[test]
    fn wrong_typed_fields_are_dropped() {
        let raw = r#"[
            {"spot_number": 0, "status": "OCCUPIED"},
            {"spot_number": "A0", "status": 1},
            {"spot_number": "A0"},
            {"status": "VACANT"},
            {"spot_number": "A0", "status": "PARKED"}
        ]"#;
        assert!(sanitize(raw, &allow(&["A0"])).is_empty());
    }

    #[test]
    fn repeated_spots_are_kept() {
        let raw = r#"[{"spot_number":"A0","status":"OCCUPIED"},{"spot_number":"A0","status":"VACANT"}]"#;
        let out = sanitize(raw, &allow(&["A0"]));
        assert_eq!(
            out,
            vec![spot("A0", SpotStatus::Occupied), spot("A0", SpotStatus::Vacant)]
        );
    }
}
