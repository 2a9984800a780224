use std::path::PathBuf;

/// All errors produced by relay-core.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("backend error ({kind}): {message}")]
    Backend { kind: &'static str, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
