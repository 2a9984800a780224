//! C5 Response Pipeline — turns a finalized utterance into a spoken
//! response: STT, the transcript gate, persona-change interception,
//! wake-word gating, routing, the LLM call (with truncation fallback),
//! and TTS synthesis. Recording calls happen on every branch so a session
//! recorder observes the full decision, not just the terminal outcome.

use crate::backends::llm::LanguageModel;
use crate::backends::recorder::SessionRecorder;
use crate::backends::stt::Transcriber;
use crate::backends::tts::Speaker;
use crate::buffering::frame::AudioBuffer;
use crate::gate::{is_low_signal, BlankBehavior, TranscriptGateConfig};
use crate::persona::{translator_system_prompt, PersonaState, TRANSLATOR_PERSONA_ID};
use crate::router::{route, Plan, RouterConfig};
use crate::transcript::Transcript;
use crate::util::text::ensure_ends_with_over;

/// Prefix that, when it opens a transcript, is parsed as a persona-change
/// command instead of being routed normally. Matching is whole-phrase,
/// case-insensitive, at the start of the (trimmed) transcript.
const PERSONA_CHANGE_PREFIX: &str = "memo change persona";
const TRANSLATE_COMMAND_PREFIX: &str = "memo translate";

pub struct PendingResponse {
    pub needs_llm: bool,
    pub user_text: String,
}

/// Outcome of running one utterance through the pipeline.
pub enum PipelineOutcome {
    /// Nothing worth saying; return to listening.
    Silent,
    /// Speak this audio immediately; fully resolved, no further LLM call.
    Speak(AudioBuffer),
    /// An acknowledgement was already queued to speak; the LLM call still
    /// needs to run and its answer spoken afterward.
    AckThenDeferred { ack_audio: Option<AudioBuffer>, pending: PendingResponse },
}

pub struct ResponsePipeline<'a> {
    pub transcriber: &'a dyn Transcriber,
    pub llm: &'a dyn LanguageModel,
    pub speaker: &'a dyn Speaker,
    pub recorder: &'a dyn SessionRecorder,
    pub gate_config: TranscriptGateConfig,
    pub router_config: RouterConfig,
    pub truncation_fallback_text: String,
    pub wake_word_enabled: bool,
    pub wake_word_phrase: String,
}

fn strip_wake_word<'a>(text: &'a str, phrase: &str) -> Option<&'a str> {
    let lower = text.to_ascii_lowercase();
    let phrase_lower = phrase.to_ascii_lowercase();
    if lower.trim_start().starts_with(&phrase_lower) {
        let idx = lower.find(&phrase_lower).unwrap() + phrase_lower.len();
        Some(text[idx..].trim_start_matches(|c: char| c == ',' || c.is_whitespace()))
    } else {
        None
    }
}

/// Strip a leading "to " connector word, e.g. turning "to pirate" into
/// "pirate". Requires a word boundary after "to" so "toronto" is untouched.
fn strip_leading_to(text: &str) -> &str {
    let trimmed = text.trim_start();
    let lower = trimmed.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("to") {
        if rest.starts_with(char::is_whitespace) {
            return trimmed[2..].trim_start();
        }
    }
    trimmed
}

fn strip_prefix_phrase<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let lower = text.to_ascii_lowercase();
    let prefix_lower = prefix.to_ascii_lowercase();
    if lower.trim_start().starts_with(&prefix_lower) {
        let idx = lower.find(&prefix_lower).unwrap() + prefix_lower.len();
        Some(text[idx..].trim())
    } else {
        None
    }
}

pub enum ControlCommand {
    ChangePersona { requested: String },
    Translate { target_language: String },
}

impl<'a> ResponsePipeline<'a> {
    /// Run STT + gate + persona/wake-word interception + routing. Returns
    /// either a resolved outcome or a detected control command for the
    /// caller (the agent loop, which owns `PersonaState`) to apply.
    pub fn handle_utterance(
        &self,
        audio: &AudioBuffer,
        sample_rate: u32,
        persona: &PersonaState,
    ) -> Result<Result<PipelineOutcome, ControlCommand>, crate::error::RelayError> {
        self.recorder.on_utterance(audio);

        let transcript = self.transcriber.transcribe(audio)?;
        self.recorder.on_transcript(&transcript);

        if is_low_signal(&transcript, &self.gate_config) {
            self.recorder.on_gated_out(&transcript);
            return Ok(Ok(self.blank_outcome(sample_rate)));
        }

        let trimmed = transcript.trimmed_text();

        if let Some(rest) = strip_prefix_phrase(trimmed, PERSONA_CHANGE_PREFIX) {
            let rest = rest.trim_end_matches('.').trim();
            let rest = strip_leading_to(rest);
            return Ok(Err(ControlCommand::ChangePersona {
                requested: rest.trim().to_string(),
            }));
        }
        if let Some(rest) = strip_prefix_phrase(trimmed, TRANSLATE_COMMAND_PREFIX) {
            return Ok(Err(ControlCommand::Translate {
                target_language: rest.trim_end_matches('.').trim().to_string(),
            }));
        }

        let command_text = if self.wake_word_enabled {
            match strip_wake_word(trimmed, &self.wake_word_phrase) {
                Some(rest) if !rest.trim().is_empty() => rest.to_string(),
                _ => {
                    // Wake word absent, or present with nothing after it.
                    return Ok(Ok(PipelineOutcome::Silent));
                }
            }
        } else {
            trimmed.to_string()
        };

        let plan = route(&command_text, confidence_of(&transcript), &self.router_config);
        Ok(Ok(self.plan_to_outcome(plan, command_text, transcript, sample_rate, persona)))
    }

    fn blank_outcome(&self, sample_rate: u32) -> PipelineOutcome {
        match self.gate_config.blank_behavior {
            BlankBehavior::None => PipelineOutcome::Silent,
            BlankBehavior::SayAgain => {
                let text = ensure_ends_with_over(&self.gate_config.say_again_phrase);
                self.recorder.on_response_text(&text);
                match self.speaker.synthesize(&text, sample_rate) {
                    Ok(audio) => PipelineOutcome::Speak(audio),
                    Err(_) => PipelineOutcome::Silent,
                }
            }
            BlankBehavior::Beep => match self.speaker.synthesize("", sample_rate) {
                Ok(audio) => PipelineOutcome::Speak(audio),
                Err(_) => PipelineOutcome::Silent,
            },
        }
    }

    fn plan_to_outcome(
        &self,
        plan: Plan,
        user_text: String,
        _transcript: Transcript,
        sample_rate: u32,
        _persona: &PersonaState,
    ) -> PipelineOutcome {
        match plan {
            Plan::NoOp => PipelineOutcome::Silent,
            Plan::Speak { text } => {
                let spoken = ensure_ends_with_over(&text);
                self.recorder.on_response_text(&spoken);
                match self.speaker.synthesize(&spoken, sample_rate) {
                    Ok(audio) => PipelineOutcome::Speak(audio),
                    Err(e) => {
                        self.recorder.on_error("tts", &e.to_string());
                        PipelineOutcome::Silent
                    }
                }
            }
            Plan::Fallback { text } => {
                let spoken = ensure_ends_with_over(&text);
                self.recorder.on_response_text(&spoken);
                match self.speaker.synthesize(&spoken, sample_rate) {
                    Ok(audio) => PipelineOutcome::Speak(audio),
                    Err(_) => PipelineOutcome::Silent,
                }
            }
            Plan::SpeakAckThenAnswer { ack_text, needs_llm } => {
                let ack_audio = if ack_text.is_empty() {
                    None
                } else {
                    let spoken = ensure_ends_with_over(&ack_text);
                    self.recorder.on_response_text(&spoken);
                    self.speaker.synthesize(&spoken, sample_rate).ok()
                };
                PipelineOutcome::AckThenDeferred {
                    ack_audio,
                    pending: PendingResponse { needs_llm, user_text },
                }
            }
        }
    }

    /// Resolve a deferred `PendingResponse` by calling the LLM and
    /// synthesizing its answer, substituting a fallback line on
    /// truncation, timeout, or an empty response.
    pub fn resolve_pending(
        &self,
        pending: &PendingResponse,
        persona: &PersonaState,
        sample_rate: u32,
    ) -> AudioBuffer {
        let response = self
            .llm
            .generate(&persona.current_system_prompt, &pending.user_text);

        let text = match response {
            Ok(r) if r.content.trim().is_empty() => self.truncation_fallback_text.clone(),
            Ok(r) if r.stop_reason == "length" || r.stop_reason == "timeout" => {
                if r.content.trim().is_empty() {
                    self.truncation_fallback_text.clone()
                } else {
                    r.content
                }
            }
            Ok(r) => r.content,
            Err(e) => {
                self.recorder.on_error("llm", &e.to_string());
                self.truncation_fallback_text.clone()
            }
        };

        let spoken = ensure_ends_with_over(&text);
        self.recorder.on_response_text(&spoken);
        self.speaker
            .synthesize(&spoken, sample_rate)
            .unwrap_or_else(|_| AudioBuffer::new(sample_rate))
    }
}

fn confidence_of(transcript: &Transcript) -> Option<f32> {
    if transcript.confidence_unknown() {
        None
    } else {
        Some(transcript.confidence)
    }
}

pub fn translator_plan(target_language: &str) -> String {
    translator_system_prompt(target_language)
}

pub const _TRANSLATOR_PERSONA_ID_REF: &str = TRANSLATOR_PERSONA_ID;
