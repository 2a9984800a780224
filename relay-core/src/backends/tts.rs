//! Text-to-speech backend trait and a reference tone-based stub.

use crate::buffering::frame::AudioBuffer;
use crate::error::Result;

pub trait Speaker: Send {
    fn synthesize(&self, text: &str, sample_rate: u32) -> Result<AudioBuffer>;
}

/// Stand-in TTS backend for tests and offline demos: emits a short sine
/// tone whose duration scales with the text length rather than real
/// speech. Lets the rest of the pipeline (gating, routing, TX timing) be
/// exercised without a real TTS engine.
pub struct ToneSpeaker {
    pub frequency_hz: f32,
    pub amplitude: f32,
    pub ms_per_char: f32,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for ToneSpeaker {
    fn default() -> Self {
        Self {
            frequency_hz: 523.25,
            amplitude: 0.4,
            ms_per_char: 45.0,
            min_ms: 300,
            max_ms: 6_000,
        }
    }
}

impl Speaker for ToneSpeaker {
    fn synthesize(&self, text: &str, sample_rate: u32) -> Result<AudioBuffer> {
        let duration_ms = ((text.chars().count() as f32 * self.ms_per_char) as u64)
            .clamp(self.min_ms, self.max_ms);
        let n = (sample_rate as u64 * duration_ms / 1000) as usize;
        let mut samples = Vec::with_capacity(n);
        for i in 0..n {
            let t = i as f32 / sample_rate as f32;
            let v = (2.0 * std::f32::consts::PI * self.frequency_hz * t).sin() * self.amplitude;
            samples.push((v * 32767.0) as i16);
        }
        Ok(AudioBuffer::from_samples(samples, sample_rate))
    }
}
