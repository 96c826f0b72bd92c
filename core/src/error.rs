use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Capture fault: sample {index} is out of range ({value})")]
    CaptureFault { index: usize, value: f32 },

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Unknown command name: {0}")]
    UnknownCommandName(String),
}

pub type Result<T> = std::result::Result<T, ModemError>;

/// Reason a frame attempt produced no command.
///
/// All of these are recoverable: the caller may simply listen again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("No sustained preamble found")]
    NoPreamble,

    #[error("No dominant tone in bit window {bit}")]
    WeakSignal { bit: usize },

    #[error("Checksum mismatch (data {data:#b}, checksum {checksum:#b})")]
    ChecksumMismatch { data: u16, checksum: u16 },

    #[error("Checksum valid but value {0} is not a known command")]
    UnknownCommand(u16),

    #[error("Input ended before the frame was complete")]
    Truncated,

    #[error("No frame decoded before the deadline")]
    Timeout,
}
