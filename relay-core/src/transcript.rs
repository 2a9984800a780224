//! Transcript — the STT backend's output for one finalized utterance.

/// A single STT result. `confidence` of `0.0` and `token_count` of `0` are
/// sentinel "not reported" values rather than genuine zero-confidence or
/// empty-utterance signals; backends that don't expose these fields should
/// leave them at their defaults instead of fabricating a value.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub text: String,
    pub confidence: f32,
    pub token_count: u32,
    pub processing_ms: u64,
}

impl Transcript {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// `true` if the backend did not report a confidence score.
    pub fn confidence_unknown(&self) -> bool {
        self.confidence == 0.0
    }

    /// `true` if the backend did not report a token count.
    pub fn token_count_not_reported(&self) -> bool {
        self.token_count == 0
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}
