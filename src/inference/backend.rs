use anyhow::Result;

use super::request::InferenceRequest;

/// Inference backend trait.
///
/// # Trust Boundary
///
/// The returned text is untrusted. Backends pass it through unmodified and
/// callers must run it through the sanitizer before exposing structured
/// results. Backends must not log image payloads or credentials.
pub trait InferenceBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Submit one request and return the raw text completion.
    ///
    /// Transport and service failures are errors. An empty completion is not.
    fn generate(&self, credential: &str, request: &InferenceRequest) -> Result<String>;
}
