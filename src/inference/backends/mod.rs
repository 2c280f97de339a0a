pub mod gemini;
pub mod stub;

pub use gemini::{GeminiBackend, GeminiConfig};
pub use stub::StubBackend;
