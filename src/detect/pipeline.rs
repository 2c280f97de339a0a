use std::path::PathBuf;
use std::sync::Arc;

use super::error::DetectError;
use super::result::DetectionResponse;
use crate::cameras::CameraStore;
use crate::inference::{ImagePayload, InferenceBackend};
use crate::media::load_reference_image;
use crate::{prompt, sanitize};

/// Client input for one detection. Either field may be absent.
#[derive(Clone, Debug, Default)]
pub struct DetectInput {
    pub camera: Option<String>,
    pub image: Option<ImagePayload>,
}

/// Detection request pipeline.
///
/// Checks run in a fixed order and every rejection happens before the
/// inference call:
/// 1. credential present
/// 2. camera key and image present
/// 3. camera key known
/// 4. reference image readable
///
/// Then: build prompt, call inference once, sanitize.
pub struct DetectionPipeline {
    cameras: Arc<CameraStore>,
    reference_image_path: PathBuf,
    credential: Option<String>,
    backend: Arc<dyn InferenceBackend>,
}

impl DetectionPipeline {
    pub fn new(
        cameras: Arc<CameraStore>,
        reference_image_path: impl Into<PathBuf>,
        credential: Option<String>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        Self {
            cameras,
            reference_image_path: reference_image_path.into(),
            credential: credential.filter(|key| !key.trim().is_empty()),
            backend,
        }
    }

    pub fn cameras(&self) -> &Arc<CameraStore> {
        &self.cameras
    }

    pub fn reference_image_path(&self) -> &std::path::Path {
        &self.reference_image_path
    }

    pub fn detect(&self, input: DetectInput) -> Result<DetectionResponse, DetectError> {
        let credential = self
            .credential
            .as_deref()
            .ok_or(DetectError::MissingCredential)?;

        let camera_key = input.camera.filter(|key| !key.is_empty());
        let (camera_key, image) = match (camera_key, input.image) {
            (Some(key), Some(image)) => (key, image),
            _ => return Err(DetectError::MissingInput),
        };

        let cfg = self
            .cameras
            .get(&camera_key)
            .map_err(DetectError::CameraConfig)?
            .ok_or_else(|| DetectError::UnknownCamera(camera_key.clone()))?;

        let reference = load_reference_image(&self.reference_image_path)
            .map_err(DetectError::ReferenceImage)?
            .ok_or(DetectError::ReferenceImageMissing)?;

        let request = prompt::build(&cfg, reference, image);
        let raw = self
            .backend
            .generate(credential, &request)
            .map_err(DetectError::Inference)?;

        let spots = sanitize::sanitize(&raw, &cfg.allowed_spots());
        log::info!(
            "camera '{}' ({}): {} spot(s) reported via {}",
            camera_key,
            cfg.camera_id,
            spots.len(),
            self.backend.name()
        );
        Ok(DetectionResponse {
            camera_id: cfg.camera_id,
            spots,
            raw,
        })
    }
}
