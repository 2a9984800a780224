//! Configuration record (§6) — the full set of knobs for audio, VAD,
//! transcript gating, routing, and the backends, loaded from JSON at
//! startup. Every field carries a `serde(default)` so a partial config
//! file only overrides what it names, mirroring the teacher's
//! `AppSettings` pattern.

use serde::{Deserialize, Serialize};

use crate::backends::llm::HttpLanguageModelConfig;
use crate::gate::TranscriptGateConfig;
use crate::router::{FastPathEntry, RouterConfig};
use crate::tx::TxConfig;
use crate::vad::energy::EnergyEndpointerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub pipeline_sample_rate: u32,
    pub fifo_capacity_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            pipeline_sample_rate: 16_000,
            fifo_capacity_frames: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VadConfig {
    pub start_threshold: f32,
    pub hysteresis_ratio: f32,
    pub min_speech_ms: u64,
    pub pause_tolerance_ms: u64,
    pub hangover_ms: u64,
    pub pre_speech_buffer_ms: u64,
    pub adaptive_threshold: bool,
    pub adaptive_k: f32,
    pub min_adaptive_threshold: f32,
    pub max_adaptive_threshold: f32,
    pub noise_floor_alpha: f32,
}

impl From<VadConfig> for EnergyEndpointerConfig {
    fn from(v: VadConfig) -> Self {
        let defaults = EnergyEndpointerConfig::default();
        EnergyEndpointerConfig {
            start_threshold: if v.start_threshold > 0.0 {
                v.start_threshold
            } else {
                defaults.start_threshold
            },
            hysteresis_ratio: if v.hysteresis_ratio > 0.0 {
                v.hysteresis_ratio
            } else {
                defaults.hysteresis_ratio
            },
            min_speech_ms: if v.min_speech_ms > 0 {
                v.min_speech_ms
            } else {
                defaults.min_speech_ms
            },
            pause_tolerance_ms: if v.pause_tolerance_ms > 0 {
                v.pause_tolerance_ms
            } else {
                defaults.pause_tolerance_ms
            },
            hangover_ms: if v.hangover_ms > 0 {
                v.hangover_ms
            } else {
                defaults.hangover_ms
            },
            pre_speech_buffer_ms: if v.pre_speech_buffer_ms > 0 {
                v.pre_speech_buffer_ms
            } else {
                defaults.pre_speech_buffer_ms
            },
            adaptive_threshold: v.adaptive_threshold,
            adaptive_k: if v.adaptive_k > 0.0 {
                v.adaptive_k
            } else {
                defaults.adaptive_k
            },
            min_adaptive_threshold: if v.min_adaptive_threshold > 0.0 {
                v.min_adaptive_threshold
            } else {
                defaults.min_adaptive_threshold
            },
            max_adaptive_threshold: if v.max_adaptive_threshold > 0.0 {
                v.max_adaptive_threshold
            } else {
                defaults.max_adaptive_threshold
            },
            noise_floor_alpha: if v.noise_floor_alpha > 0.0 {
                v.noise_floor_alpha
            } else {
                defaults.noise_floor_alpha
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlankBehaviorConfig {
    None,
    SayAgain,
    Beep,
}

impl Default for BlankBehaviorConfig {
    fn default() -> Self {
        Self::SayAgain
    }
}

impl From<BlankBehaviorConfig> for crate::gate::BlankBehavior {
    fn from(b: BlankBehaviorConfig) -> Self {
        match b {
            BlankBehaviorConfig::None => crate::gate::BlankBehavior::None,
            BlankBehaviorConfig::SayAgain => crate::gate::BlankBehavior::SayAgain,
            BlankBehaviorConfig::Beep => crate::gate::BlankBehavior::Beep,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptGateSettings {
    pub min_chars: usize,
    pub min_tokens: u32,
    pub min_confidence: f32,
    pub blank_behavior: BlankBehaviorConfig,
    pub say_again_phrase: String,
}

impl Default for TranscriptGateSettings {
    fn default() -> Self {
        let defaults = TranscriptGateConfig::default();
        Self {
            min_chars: defaults.min_chars,
            min_tokens: defaults.min_tokens,
            min_confidence: defaults.min_confidence,
            blank_behavior: BlankBehaviorConfig::default(),
            say_again_phrase: defaults.say_again_phrase,
        }
    }
}

impl From<TranscriptGateSettings> for TranscriptGateConfig {
    fn from(s: TranscriptGateSettings) -> Self {
        TranscriptGateConfig {
            min_chars: s.min_chars,
            min_tokens: s.min_tokens,
            min_confidence: s.min_confidence,
            blank_behavior: s.blank_behavior.into(),
            say_again_phrase: s.say_again_phrase,
            ..TranscriptGateConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SttConfig {
    /// When no real backend is configured, the pipeline uses
    /// `StubTranscriber` with this canned text.
    pub stub_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    pub fast_path: Vec<FastPathKeywordEntry>,
    pub repair_confidence_threshold: f32,
    pub repair_phrase: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        let defaults = RouterConfig::default();
        Self {
            fast_path: Vec::new(),
            repair_confidence_threshold: defaults.repair_confidence_threshold,
            repair_phrase: defaults.repair_phrase,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastPathKeywordEntry {
    pub keyword: String,
    pub reply: String,
}

impl From<RouterSettings> for RouterConfig {
    fn from(r: RouterSettings) -> Self {
        RouterConfig {
            fast_path: r
                .fast_path
                .into_iter()
                .map(|e| FastPathEntry {
                    keyword: e.keyword,
                    reply: e.reply,
                })
                .collect(),
            repair_confidence_threshold: r.repair_confidence_threshold,
            repair_phrase: r.repair_phrase,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Substituted for the LLM's answer when the response is truncated
    /// (`stop_reason` of "length"/"timeout") or empty.
    pub truncation_fallback_text: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let defaults = HttpLanguageModelConfig::default();
        Self {
            endpoint: defaults.endpoint,
            model: defaults.model,
            timeout_ms: defaults.timeout_ms,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            truncation_fallback_text: "I didn't finish that thought, say again?".to_string(),
        }
    }
}

impl From<LlmSettings> for HttpLanguageModelConfig {
    fn from(l: LlmSettings) -> Self {
        HttpLanguageModelConfig {
            endpoint: l.endpoint,
            model: l.model,
            timeout_ms: l.timeout_ms,
            max_tokens: l.max_tokens,
            temperature: l.temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TtsSettings {
    pub frequency_hz: Option<f32>,
    pub amplitude: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TxSettings {
    pub preroll_enabled: bool,
    pub preroll_tone_hz: f32,
    pub preroll_amplitude: f32,
    pub preroll_ms: u64,
    pub max_transmit_ms: u64,
    pub end_tone_enabled: bool,
    pub end_tone_hz: f32,
    pub end_tone_amplitude: f32,
    pub end_tone_ms: u64,
}

impl Default for TxSettings {
    fn default() -> Self {
        let d = TxConfig::default();
        Self {
            preroll_enabled: d.preroll_enabled,
            preroll_tone_hz: d.preroll_tone_hz,
            preroll_amplitude: d.preroll_amplitude,
            preroll_ms: d.preroll_ms,
            max_transmit_ms: d.max_transmit_ms,
            end_tone_enabled: d.end_tone_enabled,
            end_tone_hz: d.end_tone_hz,
            end_tone_amplitude: d.end_tone_amplitude,
            end_tone_ms: d.end_tone_ms,
        }
    }
}

impl From<TxSettings> for TxConfig {
    fn from(t: TxSettings) -> Self {
        TxConfig {
            preroll_enabled: t.preroll_enabled,
            preroll_tone_hz: t.preroll_tone_hz,
            preroll_amplitude: t.preroll_amplitude,
            preroll_ms: t.preroll_ms,
            max_transmit_ms: t.max_transmit_ms,
            end_tone_enabled: t.end_tone_enabled,
            end_tone_hz: t.end_tone_hz,
            end_tone_amplitude: t.end_tone_amplitude,
            end_tone_ms: t.end_tone_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeWordConfig {
    pub enabled: bool,
    /// Matched as a whole-word, case-insensitive phrase at the start of
    /// the transcript.
    pub phrase: String,
    /// How long after a successful wake word the agent keeps listening
    /// for the live command without needing to hear the phrase again.
    pub session_timeout_ms: u64,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            phrase: "hey memo".to_string(),
            session_timeout_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub channel_clear_silence_ms: u64,
    pub vad_guard_ms: u64,
    pub allow_barge_in: bool,
    pub default_persona_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            channel_clear_silence_ms: 700,
            vad_guard_ms: 1_500,
            allow_barge_in: true,
            default_persona_id: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaSettings {
    pub id: String,
    pub display_name: String,
    pub system_prompt: String,
}

fn default_personas() -> Vec<PersonaSettings> {
    vec![PersonaSettings {
        id: "default".to_string(),
        display_name: "Memo".to_string(),
        system_prompt: "You are Memo, a terse and helpful radio assistant. \
                         Keep answers short enough to transmit over a \
                         handheld radio, and always end your reply with \"over.\"."
            .to_string(),
    }]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub transcript_gate: TranscriptGateSettings,
    pub stt: SttConfig,
    pub router: RouterSettings,
    pub llm: LlmSettings,
    pub tts: TtsSettings,
    pub tx: TxSettings,
    pub wake_word: WakeWordConfig,
    pub agent: AgentConfig,
    pub personas: Vec<PersonaSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            vad: VadConfig::default(),
            transcript_gate: TranscriptGateSettings::default(),
            stt: SttConfig::default(),
            router: RouterSettings::default(),
            llm: LlmSettings::default(),
            tts: TtsSettings::default(),
            tx: TxSettings::default(),
            wake_word: WakeWordConfig::default(),
            agent: AgentConfig::default(),
            personas: default_personas(),
        }
    }
}

impl Config {
    /// Fill in cross-field derived defaults and clamp nonsensical values.
    /// Called once after deserialization, mirroring the teacher's
    /// `AppSettings::normalize`.
    pub fn normalize(&mut self) {
        if self.audio.pipeline_sample_rate == 0 {
            self.audio.pipeline_sample_rate = 16_000;
        }
        if self.audio.fifo_capacity_frames == 0 {
            self.audio.fifo_capacity_frames = 256;
        }
        self.vad.hysteresis_ratio = self.vad.hysteresis_ratio.clamp(0.01, 0.99);
        if self.personas.is_empty() {
            self.personas = default_personas();
        }
    }

    pub fn persona_catalog(&self) -> crate::persona::StaticPersonaCatalog {
        let personas = self
            .personas
            .iter()
            .map(|p| crate::persona::Persona {
                id: p.id.clone(),
                display_name: p.display_name.clone(),
                system_prompt: p.system_prompt.clone(),
            })
            .collect();
        crate::persona::StaticPersonaCatalog::new(personas, self.agent.default_persona_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.audio.pipeline_sample_rate, config.audio.pipeline_sample_rate);
    }

    #[test]
    fn partial_json_fills_remaining_fields_with_defaults() {
        let json = r#"{ "wake_word": { "phrase": "copy memo" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.wake_word.phrase, "copy memo");
        assert!(config.wake_word.enabled);
        assert_eq!(config.audio.pipeline_sample_rate, 16_000);
    }

    #[test]
    fn normalize_clamps_degenerate_hysteresis_ratio() {
        let mut config = Config {
            vad: VadConfig {
                hysteresis_ratio: 5.0,
                ..Default::default()
            },
            ..Default::default()
        };
        config.normalize();
        assert!(config.vad.hysteresis_ratio <= 0.99);
    }
}
