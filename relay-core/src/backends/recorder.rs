//! Session recorder — an observation hook the pipeline calls at every
//! branch (utterance received, gated out, routed, LLM response, TTS
//! output) for audit and debugging, never in the decision path itself.

use crate::buffering::frame::AudioBuffer;
use crate::transcript::Transcript;

pub trait SessionRecorder: Send {
    fn on_utterance(&self, _audio: &AudioBuffer) {}
    fn on_transcript(&self, _transcript: &Transcript) {}
    fn on_gated_out(&self, _transcript: &Transcript) {}
    fn on_response_text(&self, _text: &str) {}
    fn on_error(&self, _context: &str, _message: &str) {}
}

/// Discards every event. The default when no recorder is configured.
pub struct NullRecorder;

impl SessionRecorder for NullRecorder {}

/// Emits every event as a `tracing` event at debug level, for local
/// development without wiring a persistent recorder.
pub struct TracingRecorder;

impl SessionRecorder for TracingRecorder {
    fn on_utterance(&self, audio: &AudioBuffer) {
        tracing::debug!(duration_ms = audio.duration_ms(), "utterance captured");
    }

    fn on_transcript(&self, transcript: &Transcript) {
        tracing::debug!(text = %transcript.text, confidence = transcript.confidence, "transcript");
    }

    fn on_gated_out(&self, transcript: &Transcript) {
        tracing::debug!(text = %transcript.text, "transcript gated out as low-signal");
    }

    fn on_response_text(&self, text: &str) {
        tracing::debug!(text = %text, "response text");
    }

    fn on_error(&self, context: &str, message: &str) {
        tracing::warn!(context = %context, message = %message, "pipeline error");
    }
}
