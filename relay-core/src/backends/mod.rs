//! External backend traits (§6): STT, LLM, TTS, and session recording.
//! Concrete implementations here are reference/stub backends — production
//! deployments are expected to supply their own.

pub mod llm;
pub mod recorder;
pub mod stt;
pub mod tts;

pub use llm::{HttpLanguageModel, LanguageModel, LlmResponse};
pub use recorder::{NullRecorder, SessionRecorder, TracingRecorder};
pub use stt::{StubTranscriber, Transcriber};
pub use tts::{Speaker, ToneSpeaker};
