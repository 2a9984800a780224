//! Speech-to-text backend trait and a deterministic stub implementation.

use crate::buffering::frame::AudioBuffer;
use crate::error::Result;
use crate::transcript::Transcript;

pub trait Transcriber: Send {
    fn transcribe(&self, audio: &AudioBuffer) -> Result<Transcript>;
}

/// Deterministic backend for tests and offline demos: reports the
/// utterance's duration as a placeholder transcript rather than running
/// real recognition. Mirrors the teacher's echo-style stub model.
pub struct StubTranscriber {
    pub canned_text: String,
}

impl StubTranscriber {
    pub fn new(canned_text: impl Into<String>) -> Self {
        Self {
            canned_text: canned_text.into(),
        }
    }
}

impl Default for StubTranscriber {
    fn default() -> Self {
        Self::new("stub transcript")
    }
}

impl Transcriber for StubTranscriber {
    fn transcribe(&self, audio: &AudioBuffer) -> Result<Transcript> {
        Ok(Transcript {
            text: self.canned_text.clone(),
            confidence: 1.0,
            token_count: self.canned_text.split_whitespace().count() as u32,
            processing_ms: audio.duration_ms() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_transcriber_returns_canned_text() {
        let stt = StubTranscriber::new("hello world");
        let audio = AudioBuffer::from_samples(vec![0; 1600], 16_000);
        let t = stt.transcribe(&audio).unwrap();
        assert_eq!(t.text, "hello world");
        assert_eq!(t.token_count, 2);
    }
}
