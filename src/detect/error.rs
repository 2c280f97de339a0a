use thiserror::Error;

/// Failure of a detection request, grouped by who has to act on it.
///
/// `Display` carries the full cause for logs. Clients only ever see
/// [`DetectError::public_message`].
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("inference credential not configured")]
    MissingCredential,

    #[error("camera and image are required")]
    MissingInput,

    #[error("unknown camera '{0}'")]
    UnknownCamera(String),

    #[error("camera configuration unavailable: {0:#}")]
    CameraConfig(anyhow::Error),

    #[error("reference image not found")]
    ReferenceImageMissing,

    #[error("reference image unavailable: {0:#}")]
    ReferenceImage(anyhow::Error),

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
}

impl DetectError {
    pub fn status_code(&self) -> u16 {
        match self {
            DetectError::MissingInput | DetectError::UnknownCamera(_) => 400,
            DetectError::Inference(_) => 502,
            DetectError::MissingCredential
            | DetectError::CameraConfig(_)
            | DetectError::ReferenceImageMissing
            | DetectError::ReferenceImage(_) => 500,
        }
    }

    /// Short client-facing message. Never includes paths or upstream bodies.
    pub fn public_message(&self) -> String {
        match self {
            DetectError::MissingCredential => "Server missing GEMINI_API_KEY".to_string(),
            DetectError::MissingInput => "camera and image are required".to_string(),
            DetectError::UnknownCamera(key) => format!("Unknown camera '{}'", key),
            DetectError::CameraConfig(_) => "Camera configuration unavailable".to_string(),
            DetectError::ReferenceImageMissing => "Reference image not found on server".to_string(),
            DetectError::ReferenceImage(_) => "Reference image unavailable".to_string(),
            DetectError::Inference(_) => "Inference request failed".to_string(),
        }
    }

    /// True for failures caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(DetectError::MissingInput.status_code(), 400);
        assert_eq!(DetectError::UnknownCamera("x".into()).status_code(), 400);
        assert_eq!(DetectError::MissingCredential.status_code(), 500);
        assert_eq!(DetectError::ReferenceImageMissing.status_code(), 500);
        assert_eq!(DetectError::CameraConfig(anyhow!("bad")).status_code(), 500);
        assert_eq!(DetectError::Inference(anyhow!("down")).status_code(), 502);
    }

    #[test]
    fn public_message_hides_cause() {
        let err = DetectError::CameraConfig(anyhow!("failed to read /etc/secret/cameras.json"));
        assert!(err.to_string().contains("/etc/secret"));
        assert!(!err.public_message().contains("/etc/secret"));
    }
}
