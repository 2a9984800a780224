//! Audio capture and playback via cpal.
//!
//! # Design constraints
//!
//! The cpal input/output callbacks run on OS audio threads at elevated
//! priority. They must not allocate, block on a contended lock, or do I/O.
//! Capture writes into [`crate::buffering::InputFifo`] (an uncontended
//! `parking_lot::Mutex` is cheap enough at 20 ms cadence); playback reads
//! from [`crate::buffering::PlaybackQueue`]. Both buffers live for the
//! lifetime of the device and are shared with the agent loop via `Arc`.
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio
//! on macOS), so streams are created and held on the thread that opened
//! them; this type itself is `!Send` as a result and is expected to live
//! for the process lifetime on the main thread.

pub mod device;
pub mod resample;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::buffering::frame::{AudioBuffer, AudioFrame};
use crate::buffering::{InputFifo, PlaybackQueue};
use crate::error::{RelayError, Result};

use self::resample::RateConverter;

pub trait AudioDevice {
    /// Pop the next frame captured since the last call, blocking up to one
    /// frame period. Returns `None` on timeout (no audio available yet).
    fn read_frame(&self, timeout: Duration) -> Option<AudioFrame>;

    /// Replace the playback queue with `buf` and begin playing immediately.
    fn play(&self, buf: &AudioBuffer);

    /// Append more audio to the currently playing (or about to play)
    /// buffer, for streaming TTS output.
    fn append_playback(&self, buf: &AudioBuffer);

    /// `true` once the playback queue has fully drained.
    fn is_playback_complete(&self) -> bool;

    /// Stop playback immediately and discard any queued audio.
    fn stop_playback(&self);

    /// Discard any buffered but unread capture frames.
    fn flush_input_queue(&self);

    fn pipeline_sample_rate(&self) -> u32;

    fn input_overflow_count(&self) -> u64;
}

#[cfg(feature = "audio-cpal")]
mod cpal_backend {
    use super::*;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};
    use parking_lot::Mutex;

    /// cpal-backed capture + playback, resampling to/from a fixed pipeline
    /// rate (16 kHz by default).
    pub struct CpalAudioDevice {
        _input_stream: Stream,
        _output_stream: Stream,
        running: Arc<AtomicBool>,
        fifo: Arc<InputFifo>,
        playback: Arc<PlaybackQueue>,
        pipeline_rate: u32,
    }

    impl CpalAudioDevice {
        pub fn open(
            input_device_name: Option<&str>,
            output_device_name: Option<&str>,
            pipeline_rate: u32,
            fifo_capacity_frames: usize,
        ) -> Result<Self> {
            let host = cpal::default_host();
            let running = Arc::new(AtomicBool::new(true));
            let fifo = InputFifo::new(fifo_capacity_frames);
            let playback = PlaybackQueue::new();

            let input_device = select_input_device(&host, input_device_name)?;
            let output_device = select_output_device(&host, output_device_name)?;

            let input_supported = input_device
                .default_input_config()
                .map_err(|e| RelayError::AudioDevice(e.to_string()))?;
            let input_rate = input_supported.sample_rate().0;
            let input_channels = input_supported.channels();

            let output_supported = output_device
                .default_output_config()
                .map_err(|e| RelayError::AudioDevice(e.to_string()))?;
            let output_rate = output_supported.sample_rate().0;
            let output_channels = output_supported.channels();

            info!(
                input_rate,
                input_channels, output_rate, output_channels, pipeline_rate, "audio device opened"
            );

            let input_stream = build_input_stream(
                &input_device,
                input_supported.sample_format(),
                StreamConfig {
                    channels: input_channels,
                    sample_rate: SampleRate(input_rate),
                    buffer_size: cpal::BufferSize::Default,
                },
                Arc::clone(&fifo),
                Arc::clone(&running),
                input_channels,
                input_rate,
                pipeline_rate,
            )?;

            let output_stream = build_output_stream(
                &output_device,
                output_supported.sample_format(),
                StreamConfig {
                    channels: output_channels,
                    sample_rate: SampleRate(output_rate),
                    buffer_size: cpal::BufferSize::Default,
                },
                Arc::clone(&playback),
                Arc::clone(&running),
                output_channels,
                output_rate,
                pipeline_rate,
            )?;

            input_stream
                .play()
                .map_err(|e| RelayError::AudioStream(e.to_string()))?;
            output_stream
                .play()
                .map_err(|e| RelayError::AudioStream(e.to_string()))?;

            Ok(Self {
                _input_stream: input_stream,
                _output_stream: output_stream,
                running,
                fifo,
                playback,
                pipeline_rate,
            })
        }
    }

    impl Drop for CpalAudioDevice {
        fn drop(&mut self) {
            self.running.store(false, Ordering::Relaxed);
        }
    }

    impl AudioDevice for CpalAudioDevice {
        fn read_frame(&self, timeout: Duration) -> Option<AudioFrame> {
            self.fifo.pop_timeout(timeout)
        }

        fn play(&self, buf: &AudioBuffer) {
            self.playback.play(buf);
        }

        fn append_playback(&self, buf: &AudioBuffer) {
            self.playback.append(buf);
        }

        fn is_playback_complete(&self) -> bool {
            self.playback.is_complete()
        }

        fn stop_playback(&self) {
            self.playback.stop();
        }

        fn flush_input_queue(&self) {
            self.fifo.flush();
        }

        fn pipeline_sample_rate(&self) -> u32 {
            self.pipeline_rate
        }

        fn input_overflow_count(&self) -> u64 {
            self.fifo.overflow_count()
        }
    }

    fn select_input_device(host: &cpal::Host, preferred: Option<&str>) -> Result<cpal::Device> {
        let mut devices: Vec<(String, cpal::Device)> = host
            .input_devices()
            .map_err(|e| RelayError::AudioDevice(e.to_string()))?
            .enumerate()
            .map(|(idx, d)| {
                let name = d.name().unwrap_or_else(|_| format!("Input Device {}", idx + 1));
                (name, d)
            })
            .collect();
        if devices.is_empty() {
            return Err(RelayError::NoDefaultInputDevice);
        }

        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let preferred_idx =
            preferred.and_then(|p| devices.iter().position(|(name, _)| name == p));
        let default_idx = default_name
            .as_deref()
            .and_then(|name| devices.iter().position(|(n, _)| n == name));
        let best_idx = devices
            .iter()
            .enumerate()
            .filter(|(_, (name, _))| !device::is_loopback_like_name(name))
            .max_by_key(|(_, (name, _))| device::mic_preference_score(name))
            .map(|(idx, _)| idx);

        if preferred.is_some() && preferred_idx.is_none() {
            warn!(preferred = preferred.unwrap_or_default(), "preferred input device not found, falling back");
        }

        let selected_idx = preferred_idx
            .filter(|&idx| !device::is_loopback_like_name(&devices[idx].0))
            .or(preferred_idx)
            .or_else(|| default_idx.filter(|&idx| !device::is_loopback_like_name(&devices[idx].0)))
            .or(best_idx)
            .or(default_idx)
            .unwrap_or(0);

        Ok(devices.swap_remove(selected_idx).1)
    }

    fn select_output_device(host: &cpal::Host, preferred: Option<&str>) -> Result<cpal::Device> {
        let mut devices: Vec<(String, cpal::Device)> = host
            .output_devices()
            .map_err(|e| RelayError::AudioDevice(e.to_string()))?
            .enumerate()
            .map(|(idx, d)| {
                let name = d.name().unwrap_or_else(|_| format!("Output Device {}", idx + 1));
                (name, d)
            })
            .collect();
        if devices.is_empty() {
            return Err(RelayError::NoDefaultOutputDevice);
        }
        let default_name = host.default_output_device().and_then(|d| d.name().ok());
        let preferred_idx =
            preferred.and_then(|p| devices.iter().position(|(name, _)| name == p));
        let default_idx = default_name
            .as_deref()
            .and_then(|name| devices.iter().position(|(n, _)| n == name));
        let selected_idx = preferred_idx.or(default_idx).unwrap_or(0);
        Ok(devices.swap_remove(selected_idx).1)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_input_stream(
        device: &cpal::Device,
        format: SampleFormat,
        config: StreamConfig,
        fifo: Arc<InputFifo>,
        running: Arc<AtomicBool>,
        channels: u16,
        source_rate: u32,
        pipeline_rate: u32,
    ) -> Result<Stream> {
        let frame_samples = (pipeline_rate as usize * 20) / 1000; // 20ms frames
        let resampler = Mutex::new(RateConverter::new(source_rate, pipeline_rate, 960).ok());
        let accum: Mutex<Vec<i16>> = Mutex::new(Vec::new());
        let ch = channels as usize;

        let mut emit = move |mono_f32: &[f32]| {
            let mut resampler_guard = resampler.lock();
            let converted = match resampler_guard.as_mut() {
                Some(rc) => rc.process(mono_f32),
                None => mono_f32.to_vec(),
            };
            let mut acc = accum.lock();
            acc.extend(converted.iter().map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16));
            while acc.len() >= frame_samples {
                let chunk: Vec<i16> = acc.drain(..frame_samples).collect();
                fifo.push(AudioFrame::new(chunk, pipeline_rate));
            }
        };

        let stream = match format {
            SampleFormat::F32 => device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _| {
                        if !running.load(Ordering::Relaxed) {
                            return;
                        }
                        if ch == 1 {
                            emit(data);
                        } else {
                            let mono: Vec<f32> = data
                                .chunks(ch)
                                .map(|frame| frame.iter().sum::<f32>() / ch as f32)
                                .collect();
                            emit(&mono);
                        }
                    },
                    move |err| warn!(error = %err, "input stream error"),
                    None,
                )
                .map_err(|e| RelayError::AudioStream(e.to_string()))?,
            SampleFormat::I16 => device
                .build_input_stream(
                    &config,
                    move |data: &[i16], _| {
                        if !running.load(Ordering::Relaxed) {
                            return;
                        }
                        let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                        if ch == 1 {
                            emit(&floats);
                        } else {
                            let mono: Vec<f32> = floats
                                .chunks(ch)
                                .map(|frame| frame.iter().sum::<f32>() / ch as f32)
                                .collect();
                            emit(&mono);
                        }
                    },
                    move |err| warn!(error = %err, "input stream error"),
                    None,
                )
                .map_err(|e| RelayError::AudioStream(e.to_string()))?,
            other => {
                return Err(RelayError::AudioDevice(format!(
                    "unsupported input sample format: {other:?}"
                )))
            }
        };

        Ok(stream)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_output_stream(
        device: &cpal::Device,
        format: SampleFormat,
        config: StreamConfig,
        playback: Arc<PlaybackQueue>,
        running: Arc<AtomicBool>,
        channels: u16,
        output_rate: u32,
        pipeline_rate: u32,
    ) -> Result<Stream> {
        let resampler = Mutex::new(RateConverter::new(pipeline_rate, output_rate, 320).ok());
        let ch = channels as usize;

        let stream = match format {
            SampleFormat::F32 => device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _| {
                        if !running.load(Ordering::Relaxed) {
                            data.fill(0.0);
                            return;
                        }
                        fill_output_f32(data, ch, &playback, &resampler);
                    },
                    move |err| warn!(error = %err, "output stream error"),
                    None,
                )
                .map_err(|e| RelayError::AudioStream(e.to_string()))?,
            SampleFormat::I16 => device
                .build_output_stream(
                    &config,
                    move |data: &mut [i16], _| {
                        if !running.load(Ordering::Relaxed) {
                            data.fill(0);
                            return;
                        }
                        let frames = data.len() / ch;
                        let mut mono = vec![0f32; frames];
                        fill_output_f32(&mut mono, 1, &playback, &resampler);
                        for (i, frame) in data.chunks_mut(ch).enumerate() {
                            let sample = (mono[i].clamp(-1.0, 1.0) * 32767.0) as i16;
                            frame.fill(sample);
                        }
                    },
                    move |err| warn!(error = %err, "output stream error"),
                    None,
                )
                .map_err(|e| RelayError::AudioStream(e.to_string()))?,
            other => {
                return Err(RelayError::AudioDevice(format!(
                    "unsupported output sample format: {other:?}"
                )))
            }
        };

        Ok(stream)
    }

    fn fill_output_f32(
        data: &mut [f32],
        channels: usize,
        playback: &Arc<PlaybackQueue>,
        resampler: &Mutex<Option<RateConverter>>,
    ) {
        let frames = if channels > 0 { data.len() / channels } else { data.len() };
        let mut pcm = vec![0i16; frames];
        let n = playback.drain_into(&mut pcm);
        let mono: Vec<f32> = pcm.iter().map(|&s| s as f32 / 32768.0).collect();

        let mut guard = resampler.lock();
        let resampled = match guard.as_mut() {
            Some(rc) => rc.process(&mono),
            None => mono,
        };

        if channels <= 1 {
            for (slot, value) in data.iter_mut().zip(resampled.iter().chain(std::iter::repeat(&0.0))) {
                *slot = *value;
            }
        } else {
            for (frame_idx, frame) in data.chunks_mut(channels).enumerate() {
                let v = resampled.get(frame_idx).copied().unwrap_or(0.0);
                frame.fill(v);
            }
        }
        let _ = n;
    }
}

#[cfg(feature = "audio-cpal")]
pub use cpal_backend::CpalAudioDevice;

/// In-memory stand-in for `AudioDevice`, used by tests and by the pipeline
/// unit tests that don't want a real sound card. Frames fed in via
/// [`FakeAudioDevice::push_input`] surface through `read_frame`; audio
/// handed to `play`/`append_playback` is recorded rather than played.
pub struct FakeAudioDevice {
    fifo: Arc<InputFifo>,
    playback: Arc<PlaybackQueue>,
    pipeline_rate: u32,
    played: parking_lot::Mutex<Vec<AudioBuffer>>,
}

impl FakeAudioDevice {
    pub fn new(pipeline_rate: u32, fifo_capacity_frames: usize) -> Self {
        Self {
            fifo: InputFifo::new(fifo_capacity_frames),
            playback: PlaybackQueue::new(),
            pipeline_rate,
            played: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn push_input(&self, frame: AudioFrame) {
        self.fifo.push(frame);
    }

    pub fn played_segments(&self) -> Vec<AudioBuffer> {
        self.played.lock().clone()
    }
}

impl AudioDevice for FakeAudioDevice {
    fn read_frame(&self, timeout: Duration) -> Option<AudioFrame> {
        self.fifo.pop_timeout(timeout)
    }

    fn play(&self, buf: &AudioBuffer) {
        self.playback.play(buf);
        self.played.lock().push(buf.clone());
    }

    fn append_playback(&self, buf: &AudioBuffer) {
        self.playback.append(buf);
    }

    fn is_playback_complete(&self) -> bool {
        self.playback.is_complete()
    }

    fn stop_playback(&self) {
        self.playback.stop();
    }

    fn flush_input_queue(&self) {
        self.fifo.flush();
    }

    fn pipeline_sample_rate(&self) -> u32 {
        self.pipeline_rate
    }

    fn input_overflow_count(&self) -> u64 {
        self.fifo.overflow_count()
    }
}
