//! Gaia Parking
//!
//! Grounded parking spot occupancy from a single camera frame.
//!
//! # Architecture
//!
//! A detection request combines three inputs:
//!
//! 1. **Camera profile**: the spots a camera may report and a hint describing
//!    its perspective (`cameras`).
//! 2. **Reference map**: one labeled image of the whole lot (`media`).
//! 3. **Camera frame**: the user upload.
//!
//! The prompt builder (`prompt`) packages them for an external
//! vision-language model (`inference`). The model's reply is untrusted text;
//! the sanitizer (`sanitize`) turns it into a list of
//! `{spot_number, status}` entries restricted to the camera's allow-list.
//! `detect` runs these steps in order and maps failures to status codes.
//!
//! # Module Structure
//!
//! - `cameras`: camera profile store (load once, read many)
//! - `prompt`: deterministic request construction
//! - `inference`: backend trait, Gemini REST backend, stub backend
//! - `sanitize`: lenient allow-list filtering of model output
//! - `detect`: request pipeline, result types, error taxonomy
//! - `api`: HTTP server
//! - `map`, `overlay`: spot polygons and SVG rendering
//! - `config`: server configuration (file, defaults, environment)

pub mod api;
pub mod cameras;
pub mod config;
pub mod detect;
pub mod inference;
pub mod map;
pub mod media;
pub mod overlay;
pub mod prompt;
pub mod sanitize;

pub use cameras::{CameraConfig, CameraConfigs, CameraStore};
pub use detect::{
    DetectError, DetectInput, DetectionPipeline, DetectionResponse, DetectionResult, SpotStatus,
};
pub use inference::{
    GeminiBackend, GeminiConfig, ImagePayload, InferenceBackend, InferenceRequest, StubBackend,
};
pub use map::ParkingMap;
pub use sanitize::sanitize;
