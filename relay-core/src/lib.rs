//! Reusable realtime core for a fully local, half-duplex voice agent that
//! bridges a handheld analog radio to a local LLM: audio capture and
//! playback, speech endpointing, transcript gating, routing, LLM-backed
//! response generation, and a VOX-aware TX controller, wired together by a
//! single-threaded cooperative agent state machine.

pub mod agent;
pub mod audio;
pub mod backends;
pub mod buffering;
pub mod config;
pub mod error;
pub mod gate;
pub mod persona;
pub mod pipeline;
pub mod router;
pub mod transcript;
pub mod tx;
pub mod util;
pub mod vad;

pub use agent::{Agent, AgentRuntimeConfig, AgentState};
pub use config::Config;
pub use error::{RelayError, Result};
