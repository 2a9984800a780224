//! Sample, frame, and buffer types — the quantum of capture, VAD, and playback.

/// Signed 16-bit linear PCM sample.
pub type Sample = i16;

/// A fixed-length ordered sequence of samples representing one scheduler tick.
///
/// Default: 20 ms at 16 kHz = 320 samples. Frames are the quantum of both
/// capture and VAD processing; they are consumed per tick and discarded.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<Sample>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> f64 {
        1000.0 * self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples as float32 in [-1.0, 1.0], the STT backend's expected format.
    pub fn as_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32 / 32768.0).collect()
    }
}

/// Variable-length ordered sequence of samples — utterances, TTS output,
/// playback queues.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    pub samples: Vec<Sample>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
        }
    }

    pub fn from_samples(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> f64 {
        1000.0 * self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn extend_from_frame(&mut self, frame: &AudioFrame) {
        self.samples.extend_from_slice(&frame.samples);
    }

    pub fn append(&mut self, other: &AudioBuffer) {
        self.samples.extend_from_slice(&other.samples);
    }

    pub fn as_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| s as f32 / 32768.0).collect()
    }

    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        let pcm = samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect();
        Self::from_samples(pcm, sample_rate)
    }

    /// Truncate to at most `ms` milliseconds of audio.
    pub fn truncate_ms(&mut self, ms: u64) {
        if ms == 0 {
            return;
        }
        let max_samples = (self.sample_rate as u64 * ms / 1000) as usize;
        if self.samples.len() > max_samples {
            self.samples.truncate(max_samples);
        }
    }
}
