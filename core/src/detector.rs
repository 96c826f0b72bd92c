use crate::config::ModemConfig;
use crate::error::{ModemError, Result};
use std::f64::consts::PI;

/// Largest absolute sample value a capture device may deliver
pub const MAX_SAMPLE_MAGNITUDE: f32 = 1.0;

/// Cap on probe frequencies evaluated on each side of a band centre
const MAX_PROBES_PER_SIDE: usize = 16;

/// Narrowband power estimate at a handful of frequencies.
///
/// Power is normalised so that a sine of amplitude `A` sitting exactly on the
/// evaluated frequency reports roughly `A²`, independent of window length.
/// Implementations must return a finite, non-negative value for any window of
/// validated samples.
pub trait NarrowbandEstimator {
    fn sample_rate(&self) -> f32;

    fn power(&self, window: &[f32], freq: f32) -> f32;

    /// Strongest probe inside `center ± tolerance` as `(frequency, power)`
    fn band_peak(&self, window: &[f32], center: f32, tolerance: f32) -> (f32, f32) {
        let mut best = (center, self.power(window, center));
        if window.is_empty() || tolerance <= 0.0 {
            return best;
        }

        // Half the resolution bandwidth keeps a drifted tone inside a probe's main lobe
        let resolution = self.sample_rate() / window.len() as f32;
        let spacing = (resolution / 2.0).max(tolerance / MAX_PROBES_PER_SIDE as f32);
        let probes = ((tolerance / spacing).floor() as usize).min(MAX_PROBES_PER_SIDE);

        for i in 1..=probes {
            let offset = spacing * i as f32;
            for freq in [center - offset, center + offset] {
                let power = self.power(window, freq);
                if power > best.1 {
                    best = (freq, power);
                }
            }
        }
        best
    }

    fn band_power(&self, window: &[f32], center: f32, tolerance: f32) -> f32 {
        self.band_peak(window, center, tolerance).1
    }
}

/// Single-bin recursive (Goertzel) filter evaluated at an arbitrary frequency
#[derive(Debug, Clone, Copy)]
pub struct Goertzel {
    sample_rate: f32,
}

impl Goertzel {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
        }
    }
}

impl NarrowbandEstimator for Goertzel {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn power(&self, window: &[f32], freq: f32) -> f32 {
        let n = window.len();
        if n == 0 {
            return 0.0;
        }

        let omega = 2.0 * PI * freq as f64 / self.sample_rate as f64;
        let coeff = 2.0 * omega.cos();

        // f64 state: the window is bounded, so the filter cannot grow without limit
        let mut q1 = 0.0f64;
        let mut q2 = 0.0f64;
        for &sample in window {
            let q0 = coeff * q1 - q2 + sample as f64;
            q2 = q1;
            q1 = q0;
        }

        let magnitude_sq = q1 * q1 + q2 * q2 - coeff * q1 * q2;
        let scale = 2.0 / n as f64;
        let power = magnitude_sq * scale * scale;

        if power.is_finite() {
            power.max(0.0) as f32
        } else {
            0.0
        }
    }
}

/// Reject non-finite or out-of-range samples before they reach the filters
pub fn validate_samples(samples: &[f32]) -> Result<()> {
    match samples
        .iter()
        .position(|s| !s.is_finite() || s.abs() > MAX_SAMPLE_MAGNITUDE)
    {
        Some(index) => Err(ModemError::CaptureFault {
            index,
            value: samples[index],
        }),
        None => Ok(()),
    }
}

/// Power concentrated at `target_freq` within `samples`.
///
/// Silence yields `0.0`. Invalid samples are a capture fault rather than a
/// NaN propagated to the caller.
pub fn power_at(samples: &[f32], target_freq: f32, config: &ModemConfig) -> Result<f32> {
    validate_samples(samples)?;
    Ok(Goertzel::new(config.sample_rate).power(samples, target_freq))
}
