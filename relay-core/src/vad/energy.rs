//! Energy-based speech endpointer.
//!
//! Classifies each incoming frame by RMS energy against a hysteresis pair
//! of thresholds (start threshold higher than end threshold, so a speaker
//! trailing off doesn't flicker the detector), with a minimum speech
//! duration to debounce transient noise bursts and a two-stage silence
//! tolerance (`pause_tolerance_ms` then `hangover_ms`) so brief mid-sentence
//! pauses don't fragment an utterance. Adapted from the teacher's
//! RMS-threshold-plus-hangover-counter `EnergyVad`, generalized with
//! hysteresis, an optional adaptive noise floor, and pre-roll capture.

use crate::buffering::frame::{AudioBuffer, AudioFrame};
use crate::buffering::preroll::PreRollRing;

use super::{VADState, VadEvent};

#[derive(Debug, Clone)]
pub struct EnergyEndpointerConfig {
    /// RMS (of normalized float32 samples) above which a frame is "loud".
    pub start_threshold: f32,
    /// `end_threshold = start_threshold * hysteresis_ratio`. Must be < 1.0.
    pub hysteresis_ratio: f32,
    /// Continuous loud duration required before confirming SpeechStart.
    pub min_speech_ms: u64,
    /// Silence tolerated while remaining in the Speech state outright.
    pub pause_tolerance_ms: u64,
    /// Additional silence, after `pause_tolerance_ms` is exceeded, before
    /// SpeechEnd fires. Total allowed silence is the sum of the two.
    pub hangover_ms: u64,
    /// Lookback window prepended to the utterance on SpeechStart.
    pub pre_speech_buffer_ms: u64,
    /// When set, `start_threshold`/`end_threshold` track ambient noise
    /// instead of the fixed config values.
    pub adaptive_threshold: bool,
    pub adaptive_k: f32,
    pub min_adaptive_threshold: f32,
    pub max_adaptive_threshold: f32,
    /// EWMA smoothing factor for the adaptive noise floor, in (0, 1].
    pub noise_floor_alpha: f32,
}

impl Default for EnergyEndpointerConfig {
    fn default() -> Self {
        Self {
            start_threshold: 0.02,
            hysteresis_ratio: 0.6,
            min_speech_ms: 200,
            pause_tolerance_ms: 300,
            hangover_ms: 500,
            pre_speech_buffer_ms: 300,
            adaptive_threshold: false,
            adaptive_k: 3.0,
            min_adaptive_threshold: 0.01,
            max_adaptive_threshold: 0.3,
            noise_floor_alpha: 0.05,
        }
    }
}

pub struct EnergyEndpointer {
    config: EnergyEndpointerConfig,
    state: VADState,
    sample_rate: u32,
    speech_run_ms: u64,
    silence_run_ms: u64,
    noise_floor: f32,
    preroll: PreRollRing,
    utterance: AudioBuffer,
}

impl EnergyEndpointer {
    pub fn new(config: EnergyEndpointerConfig, sample_rate: u32) -> Self {
        let preroll_samples =
            (sample_rate as u64 * config.pre_speech_buffer_ms / 1000).max(1) as usize;
        Self {
            noise_floor: config.min_adaptive_threshold,
            preroll: PreRollRing::with_capacity_samples(preroll_samples),
            utterance: AudioBuffer::new(sample_rate),
            config,
            state: VADState::Silence,
            sample_rate,
            speech_run_ms: 0,
            silence_run_ms: 0,
        }
    }

    pub fn state(&self) -> VADState {
        self.state
    }

    fn rms(frame: &AudioFrame) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }
        let f32_samples = frame.as_f32();
        let sum_sq: f32 = f32_samples.iter().map(|s| s * s).sum();
        (sum_sq / f32_samples.len() as f32).sqrt()
    }

    fn effective_thresholds(&self) -> (f32, f32) {
        let start = if self.config.adaptive_threshold {
            (self.noise_floor * self.config.adaptive_k).clamp(
                self.config.min_adaptive_threshold,
                self.config.max_adaptive_threshold,
            )
        } else {
            self.config.start_threshold
        };
        (start, start * self.config.hysteresis_ratio)
    }

    /// Classify one frame, updating internal state and the utterance
    /// accumulator. Returns the edge event for this frame, if any.
    pub fn process(&mut self, frame: &AudioFrame) -> VadEvent {
        let energy = Self::rms(frame);
        let frame_ms = frame.duration_ms() as u64;
        let (start_threshold, end_threshold) = self.effective_thresholds();

        match self.state {
            VADState::Silence => {
                self.preroll.push_slice(&frame.samples);
                if self.config.adaptive_threshold {
                    self.noise_floor = self.config.noise_floor_alpha * energy
                        + (1.0 - self.config.noise_floor_alpha) * self.noise_floor;
                }
                if energy >= start_threshold {
                    self.speech_run_ms += frame_ms;
                    if self.speech_run_ms >= self.config.min_speech_ms {
                        self.state = VADState::Speech;
                        self.speech_run_ms = 0;
                        self.silence_run_ms = 0;
                        let lookback = self.preroll.snapshot();
                        self.utterance = AudioBuffer::from_samples(lookback, self.sample_rate);
                        self.utterance.extend_from_frame(frame);
                        return VadEvent::SpeechStart;
                    }
                } else {
                    self.speech_run_ms = 0;
                }
                VadEvent::None
            }
            VADState::Speech => {
                self.utterance.extend_from_frame(frame);
                if energy < end_threshold {
                    self.silence_run_ms += frame_ms;
                    if self.silence_run_ms >= self.config.pause_tolerance_ms {
                        self.state = VADState::Hangover;
                    }
                } else {
                    self.silence_run_ms = 0;
                }
                VadEvent::None
            }
            VADState::Hangover => {
                self.utterance.extend_from_frame(frame);
                if energy >= start_threshold {
                    self.state = VADState::Speech;
                    self.silence_run_ms = 0;
                    return VadEvent::None;
                }
                self.silence_run_ms += frame_ms;
                if self.silence_run_ms >= self.config.pause_tolerance_ms + self.config.hangover_ms
                {
                    self.state = VADState::Silence;
                    self.silence_run_ms = 0;
                    self.preroll.clear();
                    return VadEvent::SpeechEnd;
                }
                VadEvent::None
            }
        }
    }

    /// Take the accumulated utterance. Call after a `SpeechEnd` event.
    /// Leaves an empty buffer behind for the next utterance.
    pub fn finalize_segment(&mut self) -> AudioBuffer {
        std::mem::replace(&mut self.utterance, AudioBuffer::new(self.sample_rate))
    }

    /// Full reset, e.g. on agent state re-entry to IdleListening.
    pub fn reset(&mut self) {
        self.state = VADState::Silence;
        self.speech_run_ms = 0;
        self.silence_run_ms = 0;
        self.preroll.clear();
        self.utterance = AudioBuffer::new(self.sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud_frame(sample_rate: u32, ms: u64) -> AudioFrame {
        let n = (sample_rate as u64 * ms / 1000) as usize;
        AudioFrame::new(vec![8000; n], sample_rate)
    }

    fn quiet_frame(sample_rate: u32, ms: u64) -> AudioFrame {
        let n = (sample_rate as u64 * ms / 1000) as usize;
        AudioFrame::new(vec![0; n], sample_rate)
    }

    fn endpointer() -> EnergyEndpointer {
        EnergyEndpointer::new(
            EnergyEndpointerConfig {
                min_speech_ms: 40,
                pause_tolerance_ms: 40,
                hangover_ms: 40,
                pre_speech_buffer_ms: 40,
                ..Default::default()
            },
            16_000,
        )
    }

    #[test]
    fn silence_only_never_emits_speech_start() {
        let mut vad = endpointer();
        for _ in 0..10 {
            assert_eq!(vad.process(&quiet_frame(16_000, 20)), VadEvent::None);
        }
        assert_eq!(vad.state(), VADState::Silence);
    }

    #[test]
    fn sustained_energy_emits_speech_start_after_min_speech_ms() {
        let mut vad = endpointer();
        assert_eq!(vad.process(&loud_frame(16_000, 20)), VadEvent::None);
        assert_eq!(vad.process(&loud_frame(16_000, 20)), VadEvent::SpeechStart);
        assert_eq!(vad.state(), VADState::Speech);
    }

    #[test]
    fn speech_end_never_fires_without_prior_speech_start() {
        let mut vad = endpointer();
        for _ in 0..50 {
            let ev = vad.process(&quiet_frame(16_000, 20));
            assert_ne!(ev, VadEvent::SpeechEnd);
        }
    }

    #[test]
    fn brief_dip_within_pause_tolerance_does_not_end_segment() {
        let mut vad = endpointer();
        vad.process(&loud_frame(16_000, 20));
        vad.process(&loud_frame(16_000, 20)); // SpeechStart
        let ev = vad.process(&quiet_frame(16_000, 20)); // short dip < pause_tolerance_ms
        assert_eq!(ev, VadEvent::None);
        assert_eq!(vad.state(), VADState::Speech);
    }

    #[test]
    fn sustained_silence_after_speech_eventually_ends_segment() {
        let mut vad = endpointer();
        vad.process(&loud_frame(16_000, 20));
        vad.process(&loud_frame(16_000, 20)); // SpeechStart
        let mut ended = false;
        for _ in 0..10 {
            if vad.process(&quiet_frame(16_000, 20)) == VadEvent::SpeechEnd {
                ended = true;
                break;
            }
        }
        assert!(ended);
    }

    #[test]
    fn finalized_utterance_includes_pre_roll_lookback() {
        let mut vad = endpointer();
        // Warm the pre-roll with a few silent frames first.
        vad.process(&quiet_frame(16_000, 20));
        vad.process(&quiet_frame(16_000, 20));
        vad.process(&loud_frame(16_000, 20));
        vad.process(&loud_frame(16_000, 20)); // SpeechStart
        for _ in 0..10 {
            if vad.process(&quiet_frame(16_000, 20)) == VadEvent::SpeechEnd {
                break;
            }
        }
        let segment = vad.finalize_segment();
        // At least the pre-roll capacity worth of samples should be present
        // in addition to the speech itself.
        assert!(segment.len() > 0);
    }
}
