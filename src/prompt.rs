//! Prompt construction for occupancy inference.
//!
//! The builder is pure: identical inputs produce identical requests.

use crate::cameras::CameraConfig;
use crate::inference::{GenerationSettings, ImagePayload, InferenceRequest, RequestPart};

const ROLE_LINE: &str =
    "You are a parking enforcement AI. Compare the labeled Reference Map to the Camera View.";
const RULE_LINES: [&str; 4] = [
    "Rules:",
    "- Report only allowed spots.",
    "- Status = OCCUPIED, VACANT, or UNKNOWN (if ambiguous or not visible).",
    "- If alignment fails, return [].",
];
const FORMAT_LINE: &str = r#"Return JSON array: [{"spot_number":"A0","status":"OCCUPIED"}]."#;

/// Instruction text for one camera profile.
///
/// The allow-list is advisory for the model. Enforcement happens in the
/// sanitizer.
pub fn instruction_text(cfg: &CameraConfig) -> String {
    let mut lines = Vec::with_capacity(4 + RULE_LINES.len());
    lines.push(ROLE_LINE.to_string());
    lines.push(format!("Perspective hint: {}", cfg.alignment_hint));
    lines.push(format!(
        "Allowed spots (strict): {}",
        cfg.visible_spots.join(", ")
    ));
    lines.extend(RULE_LINES.iter().map(|line| line.to_string()));
    lines.push(FORMAT_LINE.to_string());
    lines.join("\n")
}

/// Build the multimodal request: instructions, reference map, camera frame.
pub fn build(
    cfg: &CameraConfig,
    reference: ImagePayload,
    camera: ImagePayload,
) -> InferenceRequest {
    InferenceRequest {
        parts: vec![
            RequestPart::Text(instruction_text(cfg)),
            RequestPart::Image(reference),
            RequestPart::Image(camera),
        ],
        generation: GenerationSettings::default(),
    }
}
