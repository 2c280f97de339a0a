use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::inference::backend::InferenceBackend;
use crate::inference::request::InferenceRequest;

/// Stub backend for testing and offline runs. Replies with a fixed completion.
///
/// Clones share state, so a test can keep one handle and inspect the calls
/// made through another.
#[derive(Clone)]
pub struct StubBackend {
    state: Arc<StubState>,
}

struct StubState {
    reply: Result<String, String>,
    calls: AtomicUsize,
    last_request: Mutex<Option<InferenceRequest>>,
}

impl StubBackend {
    pub fn new(reply: impl Into<String>) -> Self {
        Self::with_reply(Ok(reply.into()))
    }

    /// A stub whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_reply(Err(message.into()))
    }

    fn with_reply(reply: Result<String, String>) -> Self {
        Self {
            state: Arc::new(StubState {
                reply,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }),
        }
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<InferenceRequest> {
        self.state
            .last_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new("[]")
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn generate(&self, _credential: &str, request: &InferenceRequest) -> Result<String> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.state.last_request.lock() {
            *last = Some(request.clone());
        }
        match &self.state.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(anyhow!("{}", message)),
        }
    }
}
