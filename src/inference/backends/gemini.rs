//! Gemini `generateContent` backend over REST.

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::inference::backend::InferenceBackend;
use crate::inference::request::{InferenceRequest, RequestPart};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Connection settings for a Gemini-compatible endpoint.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct GeminiBackend {
    endpoint: String,
    agent: ureq::Agent,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).context("parse inference base url")?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported inference url scheme '{}'; expected http(s)",
                base.scheme()
            ));
        }
        if config.model.trim().is_empty() {
            return Err(anyhow!("inference model must not be empty"));
        }
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Ok(Self { endpoint, agent })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl InferenceBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn generate(&self, credential: &str, request: &InferenceRequest) -> Result<String> {
        let body = request_body(request);
        let response = match self
            .agent
            .post(&self.endpoint)
            .set("x-goog-api-key", credential)
            .send_json(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                log::error!(
                    "inference service returned {}: {}",
                    code,
                    truncate(&detail, 512)
                );
                return Err(anyhow!("inference service returned status {}", code));
            }
            Err(err) => return Err(anyhow!("inference request failed: {}", err)),
        };
        let parsed: GenerateContentResponse = response
            .into_json()
            .context("decode inference response")?;
        parsed.into_text()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: String,
}

fn request_body(request: &InferenceRequest) -> GenerateContentRequest {
    let parts = request
        .parts
        .iter()
        .map(|part| match part {
            RequestPart::Text(text) => Part::Text { text: text.clone() },
            RequestPart::Image(image) => Part::Inline {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                },
            },
        })
        .collect();
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts,
        }],
        generation_config: GenerationConfig {
            temperature: request.generation.temperature,
            response_mime_type: request.generation.response_mime_type.clone(),
        },
    }
}

/// Finish reasons that mean the candidate text was withheld.
const BLOCKED_FINISH_REASONS: [&str; 6] = [
    "SAFETY",
    "RECITATION",
    "LANGUAGE",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate.
    ///
    /// A blocked prompt or a candidate stopped for a content reason is an
    /// error. A response with neither candidates nor feedback is empty text.
    fn into_text(self) -> Result<String> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return match self.prompt_feedback {
                Some(feedback) => Err(anyhow!(
                    "inference response blocked: {}",
                    feedback.block_reason.as_deref().unwrap_or("no candidates")
                )),
                None => Ok(String::new()),
            };
        };
        if let Some(reason) = candidate
            .finish_reason
            .as_deref()
            .filter(|reason| BLOCKED_FINISH_REASONS.contains(reason))
        {
            return Err(anyhow!("inference candidate stopped: {}", reason));
        }
        Ok(candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
