mod error;
mod pipeline;
mod result;

pub use error::DetectError;
pub use pipeline::{DetectInput, DetectionPipeline};
pub use result::{DetectionResponse, DetectionResult, SpotStatus};
