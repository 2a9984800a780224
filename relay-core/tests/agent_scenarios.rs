//! End-to-end scenarios driving `Agent` through `FakeAudioDevice`, covering
//! the fast-path/wake-word/channel-clear/barge-in/truncation/persona
//! behaviors described for the agent loop. Each test pushes raw frames
//! into the fake capture queue and ticks the agent until it settles,
//! rather than asserting on internal pipeline types directly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use relay_core::agent::{Agent, AgentRuntimeConfig};
use relay_core::audio::{AudioDevice, FakeAudioDevice};
use relay_core::backends::llm::{LanguageModel, LlmResponse};
use relay_core::backends::recorder::SessionRecorder;
use relay_core::backends::stt::StubTranscriber;
use relay_core::backends::tts::ToneSpeaker;
use relay_core::buffering::frame::{AudioBuffer, AudioFrame};
use relay_core::error::Result as RelayResult;
use relay_core::gate::TranscriptGateConfig;
use relay_core::persona::{Persona, StaticPersonaCatalog};
use relay_core::router::{FastPathEntry, RouterConfig};
use relay_core::transcript::Transcript;
use relay_core::tx::TxConfig;

/// Wraps a shared `FakeAudioDevice` behind `AudioDevice` so the test can
/// both hand a `Box<dyn AudioDevice>` to `Agent` and keep a handle to push
/// frames and inspect playback afterward.
struct SharedDevice(Arc<FakeAudioDevice>);

impl AudioDevice for SharedDevice {
    fn read_frame(&self, timeout: Duration) -> Option<AudioFrame> {
        self.0.read_frame(timeout)
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

/// Always answers with `echo: <user text>` and `stop_reason: "stop"`.
struct EchoLlm;
impl LanguageModel for EchoLlm {
    fn generate(&self, _system_prompt: &str, user_text: &str) -> RelayResult<LlmResponse> {
        Ok(LlmResponse {
            content: format!("echo: {user_text}"),
            stop_reason: "stop".to_string(),
        })
    }
}

/// Fails the test if called — used to prove the fast path never reaches the LLM.
struct PanicLlm;
impl LanguageModel for PanicLlm {
    fn generate(&self, _system_prompt: &str, _user_text: &str) -> RelayResult<LlmResponse> {
        panic!("LLM should not have been called");
    }
}

/// Reports content as truncated regardless of input.
struct TruncatingLlm;
impl LanguageModel for TruncatingLlm {
    fn generate(&self, _system_prompt: &str, _user_text: &str) -> RelayResult<LlmResponse> {
        Ok(LlmResponse {
            content: "cut off mid-sen".to_string(),
            stop_reason: "length".to_string(),
        })
    }
}

/// Captures every spoken response line for assertions.
#[derive(Default)]
struct CapturingRecorder {
    responses: Mutex<Vec<String>>,
}

impl SessionRecorder for CapturingRecorder {
    fn on_response_text(&self, text: &str) {
        self.responses.lock().unwrap().push(text.to_string());
    }
}

/// Forwards to a shared `CapturingRecorder` so a test can keep reading its
/// captured responses after handing a boxed recorder off to `Agent`.
struct ForwardingRecorder(Arc<CapturingRecorder>);

impl SessionRecorder for ForwardingRecorder {
    fn on_response_text(&self, text: &str) {
        self.0.on_response_text(text);
    }
}

fn loud_frame() -> AudioFrame {
    AudioFrame::new(vec![8000; 320], 16_000)
}

fn quiet_frame() -> AudioFrame {
    AudioFrame::new(vec![0; 320], 16_000)
}

fn single_persona_catalog() -> Box<StaticPersonaCatalog> {
    Box::new(StaticPersonaCatalog::new(
        vec![Persona {
            id: "default".to_string(),
            display_name: "Memo".to_string(),
            system_prompt: "You are Memo.".to_string(),
        }],
        "default".to_string(),
    ))
}

fn fast_endpointer() -> relay_core::vad::energy::EnergyEndpointer {
    relay_core::vad::energy::EnergyEndpointer::new(
        relay_core::vad::energy::EnergyEndpointerConfig {
            min_speech_ms: 20,
            pause_tolerance_ms: 20,
            hangover_ms: 20,
            pre_speech_buffer_ms: 20,
            ..Default::default()
        },
        16_000,
    )
}

#[allow(clippy::too_many_arguments)]
fn build_agent(
    llm: Box<dyn LanguageModel>,
    canned_transcript: &str,
    recorder: Box<dyn SessionRecorder>,
    persona_catalog: Box<StaticPersonaCatalog>,
    router_config: RouterConfig,
    gate_config: TranscriptGateConfig,
    wake_word_enabled: bool,
    allow_barge_in: bool,
) -> (Agent, Arc<FakeAudioDevice>) {
    let device = Arc::new(FakeAudioDevice::new(16_000, 64));
    let boxed: Box<dyn AudioDevice> = Box::new(SharedDevice(device.clone()));

    let agent = Agent::new(
        boxed,
        fast_endpointer(),
        Box::new(StubTranscriber::new(canned_transcript)),
        llm,
        Box::new(ToneSpeaker::default()),
        recorder,
        persona_catalog,
        relay_core::tx::TxController::new(TxConfig {
            preroll_enabled: false,
            ..Default::default()
        }),
        gate_config,
        router_config,
        "didn't catch all of that, say again?".to_string(),
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

/// Drives one full utterance (loud frames then quiet) and ticks until the
/// agent reaches `Transmitting` or `IdleListening`, replenishing quiet
/// frames as needed so `WaitingForChannelClear` can time out. Returns
/// whichever terminal state was reached first.
fn run_utterance_to_settle(agent: &mut Agent, device: &Arc<FakeAudioDevice>) -> &'static str {
    device.push_input(loud_frame());
    device.push_input(loud_frame());
    for _ in 0..10 {
        device.push_input(quiet_frame());
    }
    for _ in 0..400 {
        agent.tick();
        if agent.state_name() == "Transmitting" {
            return "Transmitting";
        }
        if agent.state_name() == "WaitingForChannelClear" && device.read_frame(Duration::from_millis(1)).is_none() {
            device.push_input(quiet_frame());
        }
    }
    agent.state_name()
}

#[test]
fn fast_path_keyword_short_circuits_without_calling_llm() {
    let router_config = RouterConfig {
        fast_path: vec![FastPathEntry {
            keyword: "status".to_string(),
            reply: "all systems nominal".to_string(),
        }],
        repair_confidence_threshold: 0.0,
    };
    let (mut agent, device) = build_agent(
        Box::new(PanicLlm),
        "hey memo what is the status",
        Box::new(CapturingRecorder::default()),
        single_persona_catalog(),
        router_config,
        TranscriptGateConfig::default(),
        true,
        true,
    );
    let terminal = run_utterance_to_settle(&mut agent, &device);
    assert_eq!(terminal, "Transmitting");
    assert!(!device.played_segments().is_empty());
}

#[test]
fn wake_word_present_reaches_llm_and_transmits_combined_answer() {
    let (mut agent, device) = build_agent(
        Box::new(EchoLlm),
        "hey memo tell me a joke",
        Box::new(CapturingRecorder::default()),
        single_persona_catalog(),
        RouterConfig::default(),
        TranscriptGateConfig::default(),
        true,
        true,
    );
    let terminal = run_utterance_to_settle(&mut agent, &device);
    assert_eq!(terminal, "Transmitting");
    assert!(!device.played_segments().is_empty());
}

#[test]
fn wake_word_absent_returns_to_idle_without_transmitting() {
    let (mut agent, device) = build_agent(
        Box::new(PanicLlm),
        "what is the status",
        Box::new(CapturingRecorder::default()),
        single_persona_catalog(),
        RouterConfig::default(),
        TranscriptGateConfig::default(),
        true,
        true,
    );
    device.push_input(loud_frame());
    device.push_input(loud_frame());
    for _ in 0..10 {
        device.push_input(quiet_frame());
    }
    let mut reached_receiving = false;
    for _ in 0..50 {
        agent.tick();
        if agent.state_name() == "ReceivingSpeech" {
            reached_receiving = true;
        }
        if reached_receiving && agent.state_name() == "IdleListening" {
            break;
        }
    }
    assert_eq!(agent.state_name(), "IdleListening");
    assert!(device.played_segments().is_empty());
}

#[test]
fn llm_truncation_substitutes_fallback_text() {
    let shared = Arc::new(CapturingRecorder::default());
    let (mut agent, device) = build_agent(
        Box::new(TruncatingLlm),
        "hey memo tell me something long",
        Box::new(ForwardingRecorder(shared.clone())),
        single_persona_catalog(),
        RouterConfig::default(),
        TranscriptGateConfig::default(),
        true,
        true,
    );
    let terminal = run_utterance_to_settle(&mut agent, &device);
    assert_eq!(terminal, "Transmitting");
    let responses = shared.responses.lock().unwrap();
    assert!(responses.iter().any(|r| r.to_lowercase().contains("say again")));
}

#[test]
fn persona_change_command_switches_and_confirms() {
    let shared = Arc::new(CapturingRecorder::default());
    let catalog = Box::new(StaticPersonaCatalog::new(
        vec![
            Persona {
                id: "default".to_string(),
                display_name: "Memo".to_string(),
                system_prompt: "You are Memo.".to_string(),
            },
            Persona {
                id: "pirate".to_string(),
                display_name: "Captain Memo".to_string(),
                system_prompt: "You are a pirate.".to_string(),
            },
        ],
        "default".to_string(),
    ));
    let (mut agent, device) = build_agent(
        Box::new(PanicLlm),
        "memo change persona to pirate",
        Box::new(ForwardingRecorder(shared.clone())),
        catalog,
        RouterConfig::default(),
        TranscriptGateConfig::default(),
        false,
        true,
    );
    let terminal = run_utterance_to_settle(&mut agent, &device);
    assert_eq!(terminal, "Transmitting");
    let responses = shared.responses.lock().unwrap();
    assert!(responses.iter().any(|r| r.contains("Captain Memo")));
}

#[test]
fn blank_noise_transcript_is_gated_and_prompts_say_again() {
    let shared = Arc::new(CapturingRecorder::default());
    let (mut agent, device) = build_agent(
        Box::new(PanicLlm),
        "...",
        Box::new(ForwardingRecorder(shared.clone())),
        single_persona_catalog(),
        RouterConfig::default(),
        TranscriptGateConfig::default(),
        true,
        true,
    );
    let terminal = run_utterance_to_settle(&mut agent, &device);
    assert_eq!(terminal, "Transmitting");
    let responses = shared.responses.lock().unwrap();
    assert!(responses.iter().any(|r| r.to_lowercase().contains("say again")));
}

#[test]
fn barge_in_during_transmission_returns_to_receiving_speech() {
    let (mut agent, device) = build_agent(
        Box::new(EchoLlm),
        "hey memo tell me a long story",
        Box::new(CapturingRecorder::default()),
        single_persona_catalog(),
        RouterConfig::default(),
        TranscriptGateConfig::default(),
        true,
        true,
    );
    // Drive to Transmitting first.
    device.push_input(loud_frame());
    device.push_input(loud_frame());
    for _ in 0..10 {
        device.push_input(quiet_frame());
    }
    let mut reached_transmitting = false;
    for _ in 0..300 {
        agent.tick();
        if agent.state_name() == "Transmitting" {
            reached_transmitting = true;
            break;
        }
        if agent.state_name() == "WaitingForChannelClear" && device.read_frame(Duration::from_millis(1)).is_none() {
            device.push_input(quiet_frame());
        }
    }
    assert!(reached_transmitting);

    // vad_guard_ms is 0, so the very next loud frame should be treated as
    // barge-in and cut the transmission short.
    device.push_input(loud_frame());
    device.push_input(loud_frame());
    let mut interrupted = false;
    for _ in 0..20 {
        agent.tick();
        if agent.state_name() == "ReceivingSpeech" {
            interrupted = true;
            break;
        }
    }
    assert!(interrupted, "expected barge-in to move the agent back to ReceivingSpeech");
}

#[test]
fn channel_busy_delays_transmission_until_silence() {
    let (mut agent, device) = build_agent(
        Box::new(EchoLlm),
        "hey memo what is the status",
        Box::new(CapturingRecorder::default()),
        single_persona_catalog(),
        RouterConfig::default(),
        TranscriptGateConfig::default(),
        true,
        true,
    );
    device.push_input(loud_frame());
    device.push_input(loud_frame());
    for _ in 0..10 {
        device.push_input(quiet_frame());
    }
    let mut saw_waiting = false;
    for _ in 0..100 {
        agent.tick();
        if agent.state_name() == "WaitingForChannelClear" {
            saw_waiting = true;
            break;
        }
    }
    assert!(saw_waiting);

    // Keep the channel busy: every tick feeds another loud frame, so the
    // silence counter resets each time and transmission never begins.
    for _ in 0..30 {
        device.push_input(loud_frame());
        agent.tick();
        assert_ne!(agent.state_name(), "Transmitting");
    }

    // Once the channel actually goes quiet, transmission proceeds.
    for _ in 0..20 {
        device.push_input(quiet_frame());
    }
    let mut reached_transmitting = false;
    for _ in 0..100 {
        agent.tick();
        if agent.state_name() == "Transmitting" {
            reached_transmitting = true;
            break;
        }
        if agent.state_name() == "WaitingForChannelClear" && device.read_frame(Duration::from_millis(1)).is_none() {
            device.push_input(quiet_frame());
        }
    }
    assert!(reached_transmitting);
}

#[test]
fn stt_backend_error_returns_agent_to_idle_listening() {
    struct FailingTranscriber;
    impl relay_core::backends::stt::Transcriber for FailingTranscriber {
        fn transcribe(&self, _audio: &AudioBuffer) -> RelayResult<Transcript> {
            Err(relay_core::error::RelayError::Backend {
                kind: "stt",
                message: "engine unavailable".to_string(),
            })
        }
    }
    let device = Arc::new(FakeAudioDevice::new(16_000, 64));
    let boxed: Box<dyn AudioDevice> = Box::new(SharedDevice(device.clone()));
    let mut agent = Agent::new(
        boxed,
        fast_endpointer(),
        Box::new(FailingTranscriber),
        Box::new(PanicLlm),
        Box::new(ToneSpeaker::default()),
        Box::new(CapturingRecorder::default()),
        single_persona_catalog(),
        relay_core::tx::TxController::new(TxConfig {
            preroll_enabled: false,
            ..Default::default()
        }),
        TranscriptGateConfig::default(),
        RouterConfig::default(),
        "say again".to_string(),
        true,
        "hey memo".to_string(),
        AgentRuntimeConfig {
            channel_clear_silence_ms: 40,
            vad_guard_ms: 0,
            allow_barge_in: true,
            frame_poll_timeout: Duration::from_millis(5),
        },
        16_000,
    );
    device.push_input(loud_frame());
    device.push_input(loud_frame());
    for _ in 0..10 {
        device.push_input(quiet_frame());
    }
    for _ in 0..50 {
        agent.tick();
        if agent.state_name() == "IdleListening" {
            break;
        }
    }
    assert_eq!(agent.state_name(), "IdleListening");
    assert!(device.played_segments().is_empty());
}
