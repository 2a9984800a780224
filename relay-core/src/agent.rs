//! C7 Agent State Machine — the per-frame tick loop tying together the
//! endpointer, response pipeline, persona state, and TX controller.
//!
//! Runs as a single-threaded cooperative loop (§5): each call to `tick`
//! reads at most one frame, and the LLM/TTS/STT calls made while
//! resolving an utterance block the loop entirely. There is no
//! background task running STT while the loop also polls for new audio —
//! by design, the radio channel is half-duplex and nothing useful can
//! happen concurrently with "thinking" anyway.

use std::time::{Duration, Instant};

use crate::audio::AudioDevice;
use crate::backends::llm::LanguageModel;
use crate::backends::recorder::SessionRecorder;
use crate::backends::stt::Transcriber;
use crate::backends::tts::Speaker;
use crate::buffering::frame::AudioBuffer;
use crate::gate::TranscriptGateConfig;
use crate::persona::{Persona, PersonaCatalog, PersonaState};
use crate::pipeline::{ControlCommand, PipelineOutcome, ResponsePipeline};
use crate::router::RouterConfig;
use crate::tx::TxController;
use crate::util::text::ensure_ends_with_over;
use crate::vad::energy::EnergyEndpointer;
use crate::vad::VadEvent;

/// A fully resolved response audio buffer, queued to transmit once the
/// channel goes quiet.
pub struct PendingResponse {
    pub audio: AudioBuffer,
}

pub enum AgentState {
    IdleListening,
    ReceivingSpeech,
    Thinking,
    WaitingForChannelClear(PendingResponse),
    Transmitting,
}

impl std::fmt::Debug for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AgentState::IdleListening => "IdleListening",
            AgentState::ReceivingSpeech => "ReceivingSpeech",
            AgentState::Thinking => "Thinking",
            AgentState::WaitingForChannelClear(_) => "WaitingForChannelClear",
            AgentState::Transmitting => "Transmitting",
        };
        write!(f, "{name}")
    }
}

pub struct AgentRuntimeConfig {
    pub channel_clear_silence_ms: u64,
    pub vad_guard_ms: u64,
    pub allow_barge_in: bool,
    pub frame_poll_timeout: Duration,
}

impl Default for AgentRuntimeConfig {
    fn default() -> Self {
        Self {
            channel_clear_silence_ms: 700,
            vad_guard_ms: 1_500,
            allow_barge_in: true,
            frame_poll_timeout: Duration::from_millis(100),
        }
    }
}

pub struct Agent {
    audio: Box<dyn AudioDevice>,
    endpointer: EnergyEndpointer,
    transcriber: Box<dyn Transcriber>,
    llm: Box<dyn LanguageModel>,
    speaker: Box<dyn Speaker>,
    recorder: Box<dyn SessionRecorder>,
    persona_catalog: Box<dyn PersonaCatalog>,
    persona: PersonaState,
    tx: TxController,
    gate_config: TranscriptGateConfig,
    router_config: RouterConfig,
    truncation_fallback_text: String,
    wake_word_enabled: bool,
    wake_word_phrase: String,
    config: AgentRuntimeConfig,
    sample_rate: u32,
    state: AgentState,
    channel_silence_ms: u64,
    guard_until: Option<Instant>,
}

#[allow(clippy::too_many_arguments)]
impl Agent {
    pub fn new(
        audio: Box<dyn AudioDevice>,
        endpointer: EnergyEndpointer,
        transcriber: Box<dyn Transcriber>,
        llm: Box<dyn LanguageModel>,
        speaker: Box<dyn Speaker>,
        recorder: Box<dyn SessionRecorder>,
        persona_catalog: Box<dyn PersonaCatalog>,
        tx: TxController,
        gate_config: TranscriptGateConfig,
        router_config: RouterConfig,
        truncation_fallback_text: String,
        wake_word_enabled: bool,
        wake_word_phrase: String,
        config: AgentRuntimeConfig,
        sample_rate: u32,
    ) -> Self {
        let persona = PersonaState::from_persona(persona_catalog.default_persona());
        Self {
            audio,
            endpointer,
            transcriber,
            llm,
            speaker,
            recorder,
            persona_catalog,
            persona,
            tx,
            gate_config,
            router_config,
            truncation_fallback_text,
            wake_word_enabled,
            wake_word_phrase,
            config,
            sample_rate,
            state: AgentState::IdleListening,
            channel_silence_ms: 0,
            guard_until: None,
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            AgentState::IdleListening => "IdleListening",
            AgentState::ReceivingSpeech => "ReceivingSpeech",
            AgentState::Thinking => "Thinking",
            AgentState::WaitingForChannelClear(_) => "WaitingForChannelClear",
            AgentState::Transmitting => "Transmitting",
        }
    }

    fn enter_idle(&mut self) {
        self.audio.flush_input_queue();
        self.endpointer.reset();
        self.state = AgentState::IdleListening;
    }

    fn pipeline(&self) -> ResponsePipeline<'_> {
        ResponsePipeline {
            transcriber: self.transcriber.as_ref(),
            llm: self.llm.as_ref(),
            speaker: self.speaker.as_ref(),
            recorder: self.recorder.as_ref(),
            gate_config: self.gate_config.clone(),
            router_config: self.router_config.clone(),
            truncation_fallback_text: self.truncation_fallback_text.clone(),
            wake_word_enabled: self.wake_word_enabled,
            wake_word_phrase: self.wake_word_phrase.clone(),
        }
    }

    fn speak_confirmation(&self, text: &str) -> AudioBuffer {
        let spoken = ensure_ends_with_over(text);
        self.recorder.on_response_text(&spoken);
        self.speaker
            .synthesize(&spoken, self.sample_rate)
            .unwrap_or_else(|_| AudioBuffer::new(self.sample_rate))
    }

    /// Speak `text` verbatim, without routing it through
    /// `ensure_ends_with_over`'s lowercase-"over." normalization — for the
    /// fixed confirmation lines that already end with "Over."
    fn speak_literal(&self, text: &str) -> AudioBuffer {
        self.recorder.on_response_text(text);
        self.speaker
            .synthesize(text, self.sample_rate)
            .unwrap_or_else(|_| AudioBuffer::new(self.sample_rate))
    }

    fn apply_control_command(&mut self, command: ControlCommand) -> AudioBuffer {
        match command {
            ControlCommand::ChangePersona { requested } => {
                let matched = self
                    .persona_catalog
                    .ids()
                    .into_iter()
                    .find(|id| id.eq_ignore_ascii_case(&requested))
                    .and_then(|id| self.persona_catalog.get(&id));
                match matched {
                    Some(persona) => {
                        let name = persona.display_name.clone();
                        self.persona.switch_to(persona);
                        self.speak_literal(&format!("Persona changed to {name}. Over."))
                    }
                    None => self
                        .speak_literal(&format!("Persona not found: {requested}. Over.")),
                }
            }
            ControlCommand::Translate { target_language } => {
                self.persona.switch_to_translator(&target_language);
                self.speak_confirmation(&format!("Translating to {target_language} now"))
            }
        }
    }

    /// Run one scheduler tick: read at most one frame and advance the
    /// state machine. Call in a loop; each call may block briefly on the
    /// audio device and, while Thinking, on the STT/LLM/TTS backends.
    pub fn tick(&mut self) {
        match self.state {
            AgentState::IdleListening => self.tick_idle_listening(),
            AgentState::ReceivingSpeech => self.tick_receiving_speech(),
            AgentState::Thinking => unreachable!("Thinking is resolved synchronously within a single tick"),
            AgentState::WaitingForChannelClear(_) => self.tick_waiting_for_channel_clear(),
            AgentState::Transmitting => self.tick_transmitting(),
        }
    }

    fn tick_idle_listening(&mut self) {
        let Some(frame) = self.audio.read_frame(self.config.frame_poll_timeout) else {
            return;
        };
        if self.endpointer.process(&frame) == VadEvent::SpeechStart {
            self.state = AgentState::ReceivingSpeech;
        }
    }

    fn tick_receiving_speech(&mut self) {
        let Some(frame) = self.audio.read_frame(self.config.frame_poll_timeout) else {
            return;
        };
        if self.endpointer.process(&frame) == VadEvent::SpeechEnd {
            let utterance = self.endpointer.finalize_segment();
            self.state = AgentState::Thinking;
            self.run_thinking(utterance);
        }
    }

    /// Resolves the finalized utterance fully before returning: STT, the
    /// gate, routing, and (if routed to the LLM) the LLM call, all
    /// blocking. This is where the spec's "Thinking" state lives, even
    /// though it never survives past a single `tick` call.
    fn run_thinking(&mut self, utterance: AudioBuffer) {
        // Scoped so the borrow of self.{transcriber,llm,speaker,recorder}
        // ends before the match below needs &mut self.
        let result = {
            let pipeline = self.pipeline();
            pipeline.handle_utterance(&utterance, self.sample_rate, &self.persona)
        };

        let audio = match result {
            Err(e) => {
                let message = e.to_string();
                self.recorder.on_error("pipeline", &message);
                self.enter_idle();
                return;
            }
            Ok(Err(control_command)) => Some(self.apply_control_command(control_command)),
            Ok(Ok(PipelineOutcome::Silent)) => None,
            Ok(Ok(PipelineOutcome::Speak(audio))) => Some(audio),
            Ok(Ok(PipelineOutcome::AckThenDeferred { ack_audio, pending })) => {
                let answer_audio = {
                    let pipeline = self.pipeline();
                    pipeline.resolve_pending(&pending, &self.persona, self.sample_rate)
                };
                Some(match ack_audio {
                    Some(mut ack) => {
                        ack.append(&answer_audio);
                        ack
                    }
                    None => answer_audio,
                })
            }
        };

        match audio {
            Some(audio) if !audio.is_empty() => {
                self.channel_silence_ms = 0;
                self.state = AgentState::WaitingForChannelClear(PendingResponse { audio });
            }
            _ => self.enter_idle(),
        }
    }

    fn tick_waiting_for_channel_clear(&mut self) {
        let Some(frame) = self.audio.read_frame(self.config.frame_poll_timeout) else {
            return;
        };
        let frame_ms = frame.duration_ms() as u64;
        let event = self.endpointer.process(&frame);
        match event {
            VadEvent::SpeechStart => {
                self.channel_silence_ms = 0;
            }
            VadEvent::SpeechEnd => {
                // Their speech just ended; discard it, we only cared about
                // channel occupancy, not its content.
                let _ = self.endpointer.finalize_segment();
                self.channel_silence_ms = 0;
            }
            VadEvent::None => {
                if self.endpointer.state() == crate::vad::VADState::Silence {
                    self.channel_silence_ms += frame_ms;
                } else {
                    self.channel_silence_ms = 0;
                }
            }
        }

        if self.channel_silence_ms >= self.config.channel_clear_silence_ms {
            let AgentState::WaitingForChannelClear(pending) =
                std::mem::replace(&mut self.state, AgentState::Transmitting)
            else {
                unreachable!()
            };
            self.begin_transmitting(pending);
        }
    }

    fn begin_transmitting(&mut self, pending: PendingResponse) {
        self.audio.flush_input_queue();
        self.endpointer.reset();
        self.tx.transmit(self.audio.as_ref(), &pending.audio);
        self.guard_until = Some(Instant::now() + Duration::from_millis(self.config.vad_guard_ms));
    }

    fn tick_transmitting(&mut self) {
        if self.tx.is_complete(self.audio.as_ref()) {
            self.guard_until = None;
            self.enter_idle();
            return;
        }

        let Some(frame) = self.audio.read_frame(self.config.frame_poll_timeout) else {
            return;
        };

        let past_guard = self
            .guard_until
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(true);
        if !past_guard || !self.config.allow_barge_in {
            return;
        }

        if self.endpointer.process(&frame) == VadEvent::SpeechStart {
            self.tx.stop(self.audio.as_ref());
            self.guard_until = None;
            self.state = AgentState::ReceivingSpeech;
        }
    }
}

/// Construct a default persona-change utterance, exposed for callers that
/// want to prompt a persona switch out of band (e.g. a CLI flag).
pub fn default_persona_confirmation(persona: &Persona) -> String {
    format!("Persona changed to {}. Over.", persona.display_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::FakeAudioDevice;
    use crate::backends::llm::LlmResponse;
    use crate::backends::recorder::NullRecorder;
    use crate::backends::stt::StubTranscriber;
    use crate::backends::tts::ToneSpeaker;
    use crate::error::Result as RelayResult;
    use crate::persona::StaticPersonaCatalog;
    use crate::vad::energy::EnergyEndpointerConfig;

    struct EchoLlm;
    impl LanguageModel for EchoLlm {
        fn generate(&self, _s: &str, u: &str) -> RelayResult<LlmResponse> {
            Ok(LlmResponse {
                content: format!("echo: {u}"),
                stop_reason: "stop".to_string(),
            })
        }
    }

    fn make_agent(wake_word_enabled: bool, allow_barge_in: bool) -> (Agent, std::sync::Arc<FakeAudioDevice>) {
        let device = std::sync::Arc::new(FakeAudioDevice::new(16_000, 64));
        let device_box: Box<dyn AudioDevice> = {
            struct ArcDevice(std::sync::Arc<FakeAudioDevice>);
            impl AudioDevice for ArcDevice {
                fn read_frame(&self, t: Duration) -> Option<crate::buffering::frame::AudioFrame> {
                    self.0.read_frame(t)
                }
                fn play(&self, buf: &AudioBuffer) {
                    self.0.play(buf)
                }
                fn append_playback(&self, buf: &AudioBuffer) {
                    self.0.append_playback(buf)
                }
                fn is_playback_complete(&self) -> bool {
                    self.0.is_playback_complete()
                }
                fn stop_playback(&self) {
                    self.0.stop_playback()
                }
                fn flush_input_queue(&self) {
                    self.0.flush_input_queue()
                }
                fn pipeline_sample_rate(&self) -> u32 {
                    self.0.pipeline_sample_rate()
                }
                fn input_overflow_count(&self) -> u64 {
                    self.0.input_overflow_count()
                }
            }
            Box::new(ArcDevice(device.clone()))
        };

        let endpointer = EnergyEndpointer::new(
            EnergyEndpointerConfig {
                min_speech_ms: 20,
                pause_tolerance_ms: 20,
                hangover_ms: 20,
                pre_speech_buffer_ms: 20,
                ..Default::default()
            },
            16_000,
        );

        let catalog = Box::new(StaticPersonaCatalog::new(
            vec![Persona {
                id: "default".to_string(),
                display_name: "Memo".to_string(),
                system_prompt: "You are Memo.".to_string(),
            }],
            "default".to_string(),
        ));

        let agent = Agent::new(
            device_box,
            endpointer,
            Box::new(StubTranscriber::new("hey memo what is the status")),
            Box::new(EchoLlm),
            Box::new(ToneSpeaker::default()),
            Box::new(NullRecorder),
            catalog,
            TxController::new(crate::tx::TxConfig {
                preroll_enabled: false,
                ..Default::default()
            }),
            TranscriptGateConfig::default(),
            RouterConfig::default(),
            "say again".to_string(),
            wake_word_enabled,
            "hey memo".to_string(),
            AgentRuntimeConfig {
                channel_clear_silence_ms: 40,
                vad_guard_ms: 0,
                allow_barge_in,
                frame_poll_timeout: Duration::from_millis(5),
            },
            16_000,
        );
        (agent, device)
    }

    fn loud_frame() -> crate::buffering::frame::AudioFrame {
        crate::buffering::frame::AudioFrame::new(vec![8000; 320], 16_000)
    }

    fn quiet_frame() -> crate::buffering::frame::AudioFrame {
        crate::buffering::frame::AudioFrame::new(vec![0; 320], 16_000)
    }

    #[test]
    fn starts_in_idle_listening() {
        let (agent, _device) = make_agent(true, true);
        assert_eq!(agent.state_name(), "IdleListening");
    }

    #[test]
    fn sustained_speech_transitions_to_receiving_speech() {
        let (mut agent, device) = make_agent(true, true);
        device.push_input(loud_frame());
        device.push_input(loud_frame());
        agent.tick();
        agent.tick();
        assert_eq!(agent.state_name(), "ReceivingSpeech");
    }

    #[test]
    fn full_utterance_eventually_reaches_waiting_for_channel_clear_then_transmits() {
        let (mut agent, device) = make_agent(true, true);
        device.push_input(loud_frame());
        device.push_input(loud_frame());
        for _ in 0..10 {
            device.push_input(quiet_frame());
        }
        let mut reached_transmitting = false;
        for _ in 0..200 {
            agent.tick();
            if agent.state_name() == "Transmitting" {
                reached_transmitting = true;
                break;
            }
            if device.read_frame(Duration::from_millis(1)).is_none()
                && agent.state_name() == "WaitingForChannelClear"
            {
                device.push_input(quiet_frame());
            }
        }
        assert!(reached_transmitting);
    }
}
