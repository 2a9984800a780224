//! Ring buffers shared between the audio callback threads and the agent loop.
//!
//! The capture callback and playback callback both run on OS audio threads
//! and must not allocate or block. All three buffer types here use a
//! `parking_lot::Mutex` over a pre-sized `Vec`/`VecDeque` rather than a
//! lock-free SPSC queue: the teacher's `ringbuf::HeapRb` producer cannot
//! itself discard old entries on overflow (only the consumer can pop), but
//! spec.md §5 requires drop-oldest-on-overflow semantics for the input FIFO.
//! An uncontended `parking_lot::Mutex` lock is cheap enough for 20 ms frame
//! cadence and matches the `Mutex<Vec<f32>>`-guarded sample buffer idiom
//! used for cpal output callbacks elsewhere in the pack.

pub mod frame;
pub mod preroll;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use frame::{AudioBuffer, AudioFrame, Sample};

/// Bounded FIFO of captured frames. Overflow drops the *oldest* frame and
/// increments `overflow_count`, never the newest (spec.md §5).
pub struct InputFifo {
    inner: Mutex<VecDeque<AudioFrame>>,
    not_empty: Condvar,
    capacity: usize,
    overflow_count: AtomicU64,
}

impl InputFifo {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            capacity,
            overflow_count: AtomicU64::new(0),
        })
    }

    /// Push a frame, called from the capture callback thread. Never blocks.
    pub fn push(&self, frame: AudioFrame) {
        let mut guard = self.inner.lock();
        if guard.len() >= self.capacity {
            guard.pop_front();
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
        }
        guard.push_back(frame);
        self.not_empty.notify_one();
    }

    /// Pop the next frame, blocking up to `timeout` (one frame period).
    /// Returns `None` on timeout.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<AudioFrame> {
        let mut guard = self.inner.lock();
        if guard.is_empty() {
            let deadline = Instant::now() + timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return None;
                }
                let result = self.not_empty.wait_for(&mut guard, remaining);
                if !guard.is_empty() {
                    break;
                }
                if result.timed_out() {
                    return None;
                }
            }
        }
        guard.pop_front()
    }

    /// Discard all buffered frames. Called on every transition into
    /// IdleListening so audio produced while blocked in STT/LLM/TTS does
    /// not retroactively retrigger the VAD.
    pub fn flush(&self) {
        self.inner.lock().clear();
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow_count.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Atomic-swap playback queue shared with the output callback thread.
///
/// `play` replaces the queue atomically; `append_playback` extends it
/// (used for streaming TTS). Draining happens on the output callback.
pub struct PlaybackQueue {
    inner: Mutex<VecDeque<Sample>>,
    draining: std::sync::atomic::AtomicBool,
}

impl PlaybackQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(VecDeque::new()),
            draining: std::sync::atomic::AtomicBool::new(false),
        })
    }

    pub fn play(&self, buf: &AudioBuffer) {
        let mut guard = self.inner.lock();
        guard.clear();
        guard.extend(buf.samples.iter().copied());
        self.draining.store(!guard.is_empty(), Ordering::Release);
    }

    pub fn append(&self, buf: &AudioBuffer) {
        let mut guard = self.inner.lock();
        guard.extend(buf.samples.iter().copied());
        if !guard.is_empty() {
            self.draining.store(true, Ordering::Release);
        }
    }

    pub fn stop(&self) {
        let mut guard = self.inner.lock();
        guard.clear();
        self.draining.store(false, Ordering::Release);
    }

    /// Called from the output callback: fill `out` with up to `out.len()`
    /// samples, zero-padding the remainder. Returns samples written.
    pub fn drain_into(&self, out: &mut [Sample]) -> usize {
        let mut guard = self.inner.lock();
        let n = out.len().min(guard.len());
        for slot in out.iter_mut().take(n) {
            *slot = guard.pop_front().unwrap_or(0);
        }
        for slot in out.iter_mut().skip(n) {
            *slot = 0;
        }
        if guard.is_empty() {
            self.draining.store(false, Ordering::Release);
        }
        n
    }

    /// True iff the queue is empty and the device has drained.
    pub fn is_complete(&self) -> bool {
        !self.draining.load(Ordering::Acquire) && self.inner.lock().is_empty()
    }

    pub fn queued_len(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_fifo_drops_oldest_on_overflow() {
        let fifo = InputFifo::new(2);
        fifo.push(AudioFrame::new(vec![1], 16_000));
        fifo.push(AudioFrame::new(vec![2], 16_000));
        fifo.push(AudioFrame::new(vec![3], 16_000));
        assert_eq!(fifo.overflow_count(), 1);
        let first = fifo.pop_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(first.samples, vec![2]);
        let second = fifo.pop_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(second.samples, vec![3]);
    }

    #[test]
    fn input_fifo_pop_timeout_returns_none_when_empty() {
        let fifo = InputFifo::new(4);
        assert!(fifo.pop_timeout(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn input_fifo_flush_clears_pending_frames() {
        let fifo = InputFifo::new(4);
        fifo.push(AudioFrame::new(vec![1], 16_000));
        fifo.flush();
        assert!(fifo.is_empty());
    }

    #[test]
    fn playback_queue_play_replaces_and_drains() {
        let q = PlaybackQueue::new();
        q.play(&AudioBuffer::from_samples(vec![1, 2, 3], 16_000));
        assert!(!q.is_complete());
        let mut out = [0i16; 2];
        let n = q.drain_into(&mut out);
        assert_eq!(n, 2);
        assert_eq!(out, [1, 2]);
        assert!(!q.is_complete());
        let n2 = q.drain_into(&mut out);
        assert_eq!(n2, 1);
        assert!(q.is_complete());
    }

    #[test]
    fn playback_queue_append_extends_current_queue() {
        let q = PlaybackQueue::new();
        q.play(&AudioBuffer::from_samples(vec![1, 2], 16_000));
        q.append(&AudioBuffer::from_samples(vec![3, 4], 16_000));
        assert_eq!(q.queued_len(), 4);
    }

    #[test]
    fn playback_queue_stop_clears_immediately() {
        let q = PlaybackQueue::new();
        q.play(&AudioBuffer::from_samples(vec![1, 2], 16_000));
        q.stop();
        assert!(q.is_complete());
    }
}
