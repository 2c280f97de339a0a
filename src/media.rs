//! Image asset loading and MIME detection.

use anyhow::{anyhow, Result};
use std::path::Path;

use crate::inference::ImagePayload;

pub const DEFAULT_REFERENCE_IMAGE_PATH: &str = "config/reference_labeled.png";

const REFERENCE_FALLBACK_MIME: &str = "image/png";
const UPLOAD_FALLBACK_MIME: &str = "image/jpeg";
const GENERIC_MIME: &str = "application/octet-stream";

/// Read the reference map from disk.
///
/// Returns `Ok(None)` when the file does not exist so callers can report a
/// missing asset separately from an unreadable one.
pub fn load_reference_image(path: &Path) -> Result<Option<ImagePayload>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(anyhow!(
                "failed to read reference image {}: {}",
                path.display(),
                err
            ))
        }
    };
    Ok(Some(ImagePayload::new(mime_for_path(path), bytes)))
}

/// MIME type from the file extension, defaulting to PNG.
pub fn mime_for_path(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(REFERENCE_FALLBACK_MIME)
        .to_string()
}

/// MIME type for an uploaded frame.
///
/// A specific declared type wins. A missing or generic one is sniffed from the
/// leading bytes, falling back to JPEG.
pub fn mime_for_upload(declared: Option<&str>, bytes: &[u8]) -> String {
    if let Some(declared) = declared.map(str::trim) {
        if !declared.is_empty() && !declared.eq_ignore_ascii_case(GENERIC_MIME) {
            return declared.to_string();
        }
    }
    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| UPLOAD_FALLBACK_MIME.to_string())
}
