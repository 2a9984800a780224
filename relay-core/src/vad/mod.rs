//! Voice activity detection and speech endpointing.

pub mod energy;

/// Coarse state of the endpointer at any point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VADState {
    Silence,
    Speech,
    Hangover,
}

/// Edge events the endpointer emits per frame. `None` is the common case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    None,
    SpeechStart,
    SpeechEnd,
}

pub use energy::EnergyEndpointer;
