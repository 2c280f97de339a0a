/// Binary image attached to an inference request.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

// Image bytes stay out of logs and panics.
impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestPart {
    Text(String),
    Image(ImagePayload),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub response_mime_type: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            response_mime_type: "application/json".to_string(),
        }
    }
}

/// A single multimodal request: ordered parts plus generation settings.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceRequest {
    pub parts: Vec<RequestPart>,
    pub generation: GenerationSettings,
}

impl InferenceRequest {
    /// Concatenated text parts.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                RequestPart::Text(text) => Some(text.as_str()),
                RequestPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &ImagePayload> {
        self.parts.iter().filter_map(|part| match part {
            RequestPart::Image(image) => Some(image),
            RequestPart::Text(_) => None,
        })
    }
}
