//! CLI host: loads configuration, opens the audio device, wires the
//! backends, and drives the agent loop until interrupted.

mod config_file;
mod logging;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use relay_core::agent::{Agent, AgentRuntimeConfig};
use relay_core::audio::device::{list_input_devices, list_output_devices};
#[cfg(feature = "audio-cpal")]
use relay_core::audio::CpalAudioDevice;
use relay_core::audio::AudioDevice;
use relay_core::backends::llm::HttpLanguageModel;
use relay_core::backends::recorder::TracingRecorder;
use relay_core::backends::stt::StubTranscriber;
use relay_core::backends::tts::ToneSpeaker;
use relay_core::tx::TxController;
use relay_core::vad::energy::EnergyEndpointer;

/// Half-duplex radio voice agent.
#[derive(Parser, Debug)]
#[command(name = "relay-agent", version, about)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(default_value = None)]
    config_path: Option<PathBuf>,

    /// List available audio input/output devices and exit.
    #[arg(long)]
    list_devices: bool,
}

const EXIT_OK: i32 = 0;
const EXIT_CONFIG_ERROR: i32 = 2;
const EXIT_AUDIO_ERROR: i32 = 3;
const EXIT_RUNTIME_ERROR: i32 = 1;

fn main() {
    logging::init();
    let cli = Cli::parse();

    if cli.list_devices {
        for device in list_input_devices() {
            println!("input  | {:<40} default={} recommended={}", device.name, device.is_default, device.is_recommended);
        }
        for device in list_output_devices() {
            println!("output | {:<40} default={}", device.name, device.is_default);
        }
        std::process::exit(EXIT_OK);
    }

    let config_path = cli
        .config_path
        .unwrap_or_else(config_file::default_config_path);
    let config = match config_file::load_config(&config_path) {
        Ok(mut config) => {
            config.normalize();
            config
        }
        Err(e) => {
            tracing::warn!(path = %config_path.display(), error = %e, "could not load config, using defaults");
            let mut config = relay_core::Config::default();
            config.normalize();
            config
        }
    };

    if let Err(e) = run(config) {
        tracing::error!(error = %e, "fatal error");
        let exit_code = if e.downcast_ref::<relay_core::RelayError>().is_some() {
            EXIT_AUDIO_ERROR
        } else {
            EXIT_RUNTIME_ERROR
        };
        std::process::exit(exit_code);
    }
}

fn run(config: relay_core::Config) -> anyhow::Result<()> {
    let sample_rate = config.audio.pipeline_sample_rate;

    #[cfg(feature = "audio-cpal")]
    let audio: Box<dyn AudioDevice> = Box::new(CpalAudioDevice::open(
        config.audio.input_device.as_deref(),
        config.audio.output_device.as_deref(),
        sample_rate,
        config.audio.fifo_capacity_frames,
    )?);

    #[cfg(not(feature = "audio-cpal"))]
    let audio: Box<dyn AudioDevice> = {
        anyhow::bail!("relay-agent was built without the audio-cpal feature");
    };

    let endpointer = EnergyEndpointer::new(config.vad.clone().into(), sample_rate);

    let transcriber = Box::new(StubTranscriber::new(
        config
            .stt
            .stub_text
            .clone()
            .unwrap_or_else(|| "stub transcript".to_string()),
    ));

    let llm = Box::new(HttpLanguageModel::new(config.llm.clone().into())?);

    let mut speaker = ToneSpeaker::default();
    if let Some(freq) = config.tts.frequency_hz {
        speaker.frequency_hz = freq;
    }
    if let Some(amp) = config.tts.amplitude {
        speaker.amplitude = amp;
    }

    let recorder = Box::new(TracingRecorder);
    let persona_catalog = Box::new(config.persona_catalog());
    let tx = TxController::new(config.tx.clone().into());

    let agent_runtime = AgentRuntimeConfig {
        channel_clear_silence_ms: config.agent.channel_clear_silence_ms,
        vad_guard_ms: config.agent.vad_guard_ms,
        allow_barge_in: config.agent.allow_barge_in,
        frame_poll_timeout: Duration::from_millis(100),
    };

    let mut agent = Agent::new(
        audio,
        endpointer,
        transcriber,
        llm,
        Box::new(speaker),
        recorder,
        persona_catalog,
        tx,
        config.transcript_gate.clone().into(),
        config.router.clone().into(),
        config.llm.truncation_fallback_text.clone(),
        config.wake_word.enabled,
        config.wake_word.phrase.clone(),
        agent_runtime,
        sample_rate,
    );

    tracing::info!("agent started, entering IdleListening");
    loop {
        agent.tick();
    }
}
