use std::path::PathBuf;
use thiserror::Error;
use tonelink_core::ModemError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Modem(#[from] ModemError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}: sample rate is {found} Hz, configuration expects {expected} Hz")]
    SampleRateMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    #[error("No audio {0} available: pass --{0}-wav or build with the `device` feature")]
    NoAudioBackend(&'static str),
}
