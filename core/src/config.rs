use crate::command::Command;
use crate::error::{ModemError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest bit window the detector can resolve reliably
const MIN_BIT_SAMPLES: usize = 64;

/// Shortest preamble the scanner can split into analysis windows
const MIN_PREAMBLE_SAMPLES: usize = 512;

const MAX_DATA_BITS: u8 = 8;
const MAX_CHECKSUM_BITS: u8 = 16;

/// Modem parameters. Sender and receiver must use identical values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Samples per second for synthesis and capture
    pub sample_rate: u32,
    /// Tone for bit value 0 (Hz)
    pub mark_freq: f32,
    /// Tone for bit value 1 (Hz)
    pub space_freq: f32,
    /// Start-of-frame marker tone (Hz)
    pub preamble_freq: f32,
    /// Seconds per data/checksum bit
    pub bit_duration: f32,
    /// Seconds the preamble must be sustained
    pub preamble_duration: f32,
    /// Seconds of trailing silence after the last bit
    pub postamble_duration: f32,
    /// Detector power a tone must reach to count as present
    pub min_signal_power: f32,
    /// Half-width of each frequency band (Hz)
    pub frequency_tolerance: f32,
    /// Payload bits per frame
    pub data_bits: u8,
    /// Checksum bits appended after the payload
    pub checksum_bits: u8,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            mark_freq: crate::DEFAULT_MARK_FREQ,
            space_freq: crate::DEFAULT_SPACE_FREQ,
            preamble_freq: crate::DEFAULT_PREAMBLE_FREQ,
            bit_duration: crate::DEFAULT_BIT_DURATION,
            preamble_duration: crate::DEFAULT_PREAMBLE_DURATION,
            postamble_duration: crate::DEFAULT_POSTAMBLE_DURATION,
            min_signal_power: crate::DEFAULT_MIN_SIGNAL_POWER,
            frequency_tolerance: crate::DEFAULT_FREQUENCY_TOLERANCE,
            data_bits: crate::DEFAULT_DATA_BITS,
            checksum_bits: crate::DEFAULT_CHECKSUM_BITS,
        }
    }
}

impl ModemConfig {
    /// Check every invariant both endpoints rely on
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be positive"));
        }

        for (name, value) in [
            ("bit_duration", self.bit_duration),
            ("preamble_duration", self.preamble_duration),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{} must be a positive number of seconds", name)));
            }
        }
        if !self.postamble_duration.is_finite() || self.postamble_duration < 0.0 {
            return Err(invalid("postamble_duration must not be negative"));
        }

        if !self.frequency_tolerance.is_finite() || self.frequency_tolerance < 0.0 {
            return Err(invalid("frequency_tolerance must not be negative"));
        }
        if !self.min_signal_power.is_finite() || self.min_signal_power <= 0.0 {
            return Err(invalid("min_signal_power must be positive"));
        }

        let nyquist = self.sample_rate as f32 / 2.0;
        for (name, freq) in [
            ("mark_freq", self.mark_freq),
            ("space_freq", self.space_freq),
            ("preamble_freq", self.preamble_freq),
        ] {
            if !freq.is_finite() || freq <= self.frequency_tolerance || freq + self.frequency_tolerance >= nyquist {
                return Err(invalid(format!(
                    "{} ({} Hz) must lie inside (tolerance, nyquist - tolerance) = ({}, {})",
                    name,
                    freq,
                    self.frequency_tolerance,
                    nyquist - self.frequency_tolerance
                )));
            }
        }

        if (self.mark_freq - self.space_freq).abs() <= 2.0 * self.frequency_tolerance {
            return Err(invalid("mark and space frequencies must differ by more than twice the tolerance"));
        }
        if (self.preamble_freq - self.mark_freq).abs() <= self.frequency_tolerance
            || (self.preamble_freq - self.space_freq).abs() <= self.frequency_tolerance
        {
            return Err(invalid("preamble frequency must differ from mark and space by more than the tolerance"));
        }

        if self.data_bits == 0 || self.data_bits > MAX_DATA_BITS {
            return Err(invalid(format!("data_bits must be in 1..={}", MAX_DATA_BITS)));
        }
        if Command::max_value() >= 1u16 << self.data_bits {
            return Err(invalid(format!(
                "data_bits = {} cannot hold command value {}",
                self.data_bits,
                Command::max_value()
            )));
        }
        if self.checksum_bits == 0 || self.checksum_bits > MAX_CHECKSUM_BITS {
            return Err(invalid(format!("checksum_bits must be in 1..={}", MAX_CHECKSUM_BITS)));
        }

        if self.bit_samples() < MIN_BIT_SAMPLES {
            return Err(invalid(format!("bit_duration is shorter than {} samples", MIN_BIT_SAMPLES)));
        }
        if self.preamble_samples() < MIN_PREAMBLE_SAMPLES {
            return Err(invalid(format!(
                "preamble_duration is shorter than {} samples",
                MIN_PREAMBLE_SAMPLES
            )));
        }

        Ok(())
    }

    pub fn bit_samples(&self) -> usize {
        seconds_to_samples(self.bit_duration, self.sample_rate)
    }

    pub fn preamble_samples(&self) -> usize {
        seconds_to_samples(self.preamble_duration, self.sample_rate)
    }

    pub fn postamble_samples(&self) -> usize {
        seconds_to_samples(self.postamble_duration, self.sample_rate)
    }

    /// Data plus checksum bits
    pub fn frame_bits(&self) -> usize {
        self.data_bits as usize + self.checksum_bits as usize
    }

    /// Exact length of a synthesized frame
    pub fn frame_samples(&self) -> usize {
        self.preamble_samples() + self.frame_bits() * self.bit_samples() + self.postamble_samples()
    }

    /// Playback time of one frame
    pub fn frame_duration(&self) -> Duration {
        self.samples_to_duration(self.frame_samples())
    }

    pub fn samples_to_duration(&self, samples: usize) -> Duration {
        Duration::from_secs_f64(samples as f64 / self.sample_rate as f64)
    }

    pub fn duration_to_samples(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as usize
    }
}

fn seconds_to_samples(seconds: f32, sample_rate: u32) -> usize {
    (seconds as f64 * sample_rate as f64).round().max(0.0) as usize
}

fn invalid(message: impl Into<String>) -> ModemError {
    ModemError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        ModemConfig::default().validate().unwrap();
    }

    #[test]
    fn test_default_sample_counts() {
        let config = ModemConfig::default();
        assert_eq!(config.bit_samples(), 4410);
        assert_eq!(config.preamble_samples(), 22050);
        assert_eq!(config.postamble_samples(), 8820);
        assert_eq!(config.frame_bits(), 8);
        assert_eq!(config.frame_samples(), 22050 + 8 * 4410 + 8820);
    }

    #[test]
    fn test_frame_duration_matches_components() {
        let config = ModemConfig::default();
        let expected = config.preamble_duration
            + config.frame_bits() as f32 * config.bit_duration
            + config.postamble_duration;
        let actual = config.frame_duration().as_secs_f32();
        assert!((actual - expected).abs() < 1e-3, "expected {}s, got {}s", expected, actual);
    }

    #[test]
    fn test_rejects_overlapping_bit_bands() {
        let config = ModemConfig {
            space_freq: 1350.0,
            ..ModemConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_preamble_inside_bit_band() {
        let config = ModemConfig {
            preamble_freq: 1850.0,
            ..ModemConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_frequency_above_nyquist() {
        let config = ModemConfig {
            sample_rate: 4000,
            ..ModemConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_data_field_too_small_for_table() {
        let config = ModemConfig {
            data_bits: 2,
            ..ModemConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        let config = ModemConfig {
            min_signal_power: 0.0,
            ..ModemConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ModemConfig = serde_json::from_str(r#"{ "bit_duration": 0.05 }"#).unwrap();
        assert_eq!(config.bit_duration, 0.05);
        assert_eq!(config.mark_freq, ModemConfig::default().mark_freq);
        config.validate().unwrap();
    }
}
