//! Gateway to the external vision-language inference service.
//!
//! The service is opaque. This module only packages requests and returns the
//! raw completion text; interpretation belongs to the sanitizer.

mod backend;
pub mod backends;
mod request;

pub use backend::InferenceBackend;
pub use backends::{GeminiBackend, GeminiConfig, StubBackend};
pub use request::{GenerationSettings, ImagePayload, InferenceRequest, RequestPart};
