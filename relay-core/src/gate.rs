//! Transcript gate — decides whether a finalized transcript carries enough
//! signal to route at all, before it ever reaches the router or the LLM.

use crate::transcript::Transcript;

#[derive(Debug, Clone)]
pub struct TranscriptGateConfig {
    /// Transcripts equal to one of these (case-insensitive, trimmed) are
    /// treated as blank regardless of length — STT backends commonly emit
    /// sentinels like "[BLANK_AUDIO]" for silence.
    pub blank_sentinels: Vec<String>,
    pub min_chars: usize,
    pub min_tokens: u32,
    pub min_confidence: f32,
    /// Substrings that, if the whole (trimmed, lowercased) transcript
    /// matches one exactly, mark it as noise rather than an utterance.
    pub noise_patterns: Vec<String>,
    /// What to do when a transcript is rejected by this gate.
    pub blank_behavior: BlankBehavior,
    /// Phrase spoken for `BlankBehavior::SayAgain`, before the "over"
    /// suffix is appended.
    pub say_again_phrase: String,
}

impl Default for TranscriptGateConfig {
    fn default() -> Self {
        Self {
            blank_sentinels: vec![
                "[BLANK_AUDIO]".to_string(),
                "(silence)".to_string(),
                "[SILENCE]".to_string(),
            ],
            min_chars: 2,
            min_tokens: 0,
            min_confidence: 0.0,
            noise_patterns: vec!["...".to_string(), "[noise]".to_string()],
            blank_behavior: BlankBehavior::SayAgain,
            say_again_phrase: "Say again".to_string(),
        }
    }
}

/// What the agent should do with a transcript the gate rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankBehavior {
    /// Say nothing, return to listening.
    None,
    /// Speak a short "didn't catch that" prompt.
    SayAgain,
    /// Play a short acknowledgement tone instead of speech.
    Beep,
}

/// `true` if the transcript should be rejected before reaching the router.
pub fn is_low_signal(transcript: &Transcript, config: &TranscriptGateConfig) -> bool {
    let text = transcript.trimmed_text();
    let normalized = text.to_lowercase();

    if config
        .blank_sentinels
        .iter()
        .any(|s| s.to_lowercase() == normalized)
    {
        return true;
    }
    if config
        .noise_patterns
        .iter()
        .any(|p| p.to_lowercase() == normalized)
    {
        return true;
    }
    if text.chars().count() < config.min_chars {
        return true;
    }
    if !transcript.token_count_not_reported() && transcript.token_count < config.min_tokens {
        return true;
    }
    if !transcript.confidence_unknown() && transcript.confidence < config.min_confidence {
        return true;
    }
    false
}
