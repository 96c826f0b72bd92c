//! Acoustic command modem
//!
//! Sends a small closed set of commands between two machines over a speaker
//! and a microphone using three-tone FSK: a sustained preamble tone marks the
//! start of a frame, followed by fixed-width mark/space bits and a checksum.

pub mod command;
pub mod config;
pub mod decoder;
pub mod detector;
pub mod error;
pub mod framing;
pub mod session;
pub mod synth;

pub use command::Command;
pub use config::ModemConfig;
pub use decoder::{DecodeResult, Decoded, DecoderState, FrameDecoder};
pub use detector::{power_at, Goertzel, NarrowbandEstimator};
pub use error::{ModemError, Rejection, Result};
pub use session::{AudioSink, AudioSource, Clock, Session, SystemClock};
pub use synth::synthesize;

// Audio configuration
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

// Tone plan
pub const DEFAULT_MARK_FREQ: f32 = 1200.0; // Hz, bit 0
pub const DEFAULT_SPACE_FREQ: f32 = 1800.0; // Hz, bit 1
pub const DEFAULT_PREAMBLE_FREQ: f32 = 2400.0; // Hz
pub const DEFAULT_FREQUENCY_TOLERANCE: f32 = 100.0; // Hz either side

// Frame timing
pub const DEFAULT_BIT_DURATION: f32 = 0.1; // seconds, 10 baud
pub const DEFAULT_PREAMBLE_DURATION: f32 = 0.5; // seconds
pub const DEFAULT_POSTAMBLE_DURATION: f32 = 0.2; // seconds

// Frame layout
pub const DEFAULT_DATA_BITS: u8 = 4;
pub const DEFAULT_CHECKSUM_BITS: u8 = 4;

// Detection
pub const DEFAULT_MIN_SIGNAL_POWER: f32 = 0.001; // amplitude ~0.032
