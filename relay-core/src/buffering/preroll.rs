//! Fixed-capacity circular buffer holding the last N ms of audio *before*
//! the VAD declares SpeechStart, so the finalized utterance includes the
//! onset the endpointer's hysteresis would otherwise clip.

use super::frame::Sample;

/// Circular buffer of raw samples, capacity fixed at construction.
/// Pushing past capacity silently overwrites the oldest samples — this is
/// a rolling lookback window, not a queue that must be drained.
pub struct PreRollRing {
    buf: Vec<Sample>,
    capacity: usize,
    next: usize,
    filled: usize,
}

impl PreRollRing {
    pub fn with_capacity_samples(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            capacity: capacity.max(1),
            next: 0,
            filled: 0,
        }
    }

    pub fn push_slice(&mut self, samples: &[Sample]) {
        for &s in samples {
            self.buf[self.next] = s;
            self.next = (self.next + 1) % self.capacity;
            self.filled = (self.filled + 1).min(self.capacity);
        }
    }

    /// Samples currently held, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        if self.filled < self.capacity {
            self.buf[..self.filled].to_vec()
        } else {
            let mut out = Vec::with_capacity(self.capacity);
            out.extend_from_slice(&self.buf[self.next..]);
            out.extend_from_slice(&self.buf[..self.next]);
            out
        }
    }

    pub fn clear(&mut self) {
        self.next = 0;
        self.filled = 0;
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }
}
