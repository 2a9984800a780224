//! C6 TX Controller — keys the transmitter (conceptually; in practice,
//! drives the output device) with an optional VOX pre-roll tone, enforces
//! the maximum transmit duration, and optionally appends an end tone.

use crate::audio::AudioDevice;
use crate::buffering::frame::AudioBuffer;

#[derive(Debug, Clone)]
pub struct TxConfig {
    /// Silence/tone played before speech so the far end's VOX keys up
    /// before the first word, avoiding clipped onsets.
    pub preroll_enabled: bool,
    pub preroll_tone_hz: f32,
    pub preroll_amplitude: f32,
    pub preroll_ms: u64,
    /// Hard cap on a single transmission. `0` disables the cap.
    pub max_transmit_ms: u64,
    pub end_tone_enabled: bool,
    pub end_tone_hz: f32,
    pub end_tone_amplitude: f32,
    pub end_tone_ms: u64,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            preroll_enabled: true,
            preroll_tone_hz: 440.0,
            preroll_amplitude: 0.55,
            preroll_ms: 350,
            max_transmit_ms: 0,
            end_tone_enabled: false,
            end_tone_hz: 880.0,
            end_tone_amplitude: 0.3,
            end_tone_ms: 120,
        }
    }
}

fn sine_tone(freq_hz: f32, amplitude: f32, duration_ms: u64, sample_rate: u32) -> AudioBuffer {
    let n = (sample_rate as u64 * duration_ms / 1000) as usize;
    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f32 / sample_rate as f32;
        let v = (2.0 * std::f32::consts::PI * freq_hz * t).sin() * amplitude;
        samples.push((v * 32767.0) as i16);
    }
    AudioBuffer::from_samples(samples, sample_rate)
}

/// Orchestrates one transmission: pre-roll tone (if enabled), the speech
/// itself (truncated to `max_transmit_ms`), and an end tone (if enabled).
/// The pre-roll tone is generated once and cached since its parameters
/// never change at runtime.
pub struct TxController {
    config: TxConfig,
    cached_preroll: Option<AudioBuffer>,
    cached_end_tone: Option<AudioBuffer>,
}

impl TxController {
    pub fn new(config: TxConfig) -> Self {
        Self {
            config,
            cached_preroll: None,
            cached_end_tone: None,
        }
    }

    fn preroll_tone(&mut self, sample_rate: u32) -> Option<AudioBuffer> {
        if !self.config.preroll_enabled {
            return None;
        }
        if self
            .cached_preroll
            .as_ref()
            .map(|b| b.sample_rate != sample_rate)
            .unwrap_or(true)
        {
            self.cached_preroll = Some(sine_tone(
                self.config.preroll_tone_hz,
                self.config.preroll_amplitude,
                self.config.preroll_ms,
                sample_rate,
            ));
        }
        self.cached_preroll.clone()
    }

    fn end_tone(&mut self, sample_rate: u32) -> Option<AudioBuffer> {
        if !self.config.end_tone_enabled {
            return None;
        }
        if self
            .cached_end_tone
            .as_ref()
            .map(|b| b.sample_rate != sample_rate)
            .unwrap_or(true)
        {
            self.cached_end_tone = Some(sine_tone(
                self.config.end_tone_hz,
                self.config.end_tone_amplitude,
                self.config.end_tone_ms,
                sample_rate,
            ));
        }
        self.cached_end_tone.clone()
    }

    /// Begin transmitting `speech`, applying the transmit cap and tones.
    /// Returns the total queued duration in milliseconds.
    pub fn transmit(&mut self, device: &dyn AudioDevice, speech: &AudioBuffer) -> u64 {
        let sample_rate = speech.sample_rate;
        let mut capped = speech.clone();
        capped.truncate_ms(self.config.max_transmit_ms);

        if let Some(preroll) = self.preroll_tone(sample_rate) {
            device.play(&preroll);
            device.append_playback(&capped);
        } else {
            device.play(&capped);
        }

        if let Some(end_tone) = self.end_tone(sample_rate) {
            device.append_playback(&end_tone);
        }

        let preroll_ms = if self.config.preroll_enabled {
            self.config.preroll_ms
        } else {
            0
        };
        let end_tone_ms = if self.config.end_tone_enabled {
            self.config.end_tone_ms
        } else {
            0
        };
        preroll_ms + capped.duration_ms() as u64 + end_tone_ms
    }

    pub fn stop(&self, device: &dyn AudioDevice) {
        device.stop_playback();
    }

    pub fn is_complete(&self, device: &dyn AudioDevice) -> bool {
        device.is_playback_complete()
    }
}
