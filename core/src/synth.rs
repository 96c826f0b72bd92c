use crate::command::Command;
use crate::config::ModemConfig;
use crate::error::Result;
use crate::framing::FrameBits;
use std::f64::consts::PI;

/// Peak amplitude of every tone in a frame
pub const TONE_AMPLITUDE: f32 = 0.5;

/// Fade applied to the first and last sample of the tone burst to avoid clicks
const EDGE_FADE_SECS: f32 = 0.005;

/// Synthesize one complete frame for `command`.
///
/// Layout: preamble tone, `data_bits + checksum_bits` mark/space tones with no
/// gaps, then `postamble_duration` of silence. The result is always exactly
/// [`ModemConfig::frame_samples`] long.
pub fn synthesize(command: Command, config: &ModemConfig) -> Result<Vec<f32>> {
    render(&FrameBits::for_command(command, config), config)
}

/// Render arbitrary frame bits (used directly to produce corrupted frames)
pub fn render(frame: &FrameBits, config: &ModemConfig) -> Result<Vec<f32>> {
    config.validate()?;

    let bit_samples = config.bit_samples();
    let mut samples = Vec::with_capacity(config.frame_samples());
    let mut oscillator = Oscillator::new(config.sample_rate);

    oscillator.emit(config.preamble_freq, config.preamble_samples(), &mut samples);
    for bit in frame.bits() {
        let freq = if bit { config.space_freq } else { config.mark_freq };
        oscillator.emit(freq, bit_samples, &mut samples);
    }

    let fade = edge_fade_samples(config.sample_rate).min(samples.len() / 2);
    apply_edge_fade(&mut samples, fade);

    samples.resize(samples.len() + config.postamble_samples(), 0.0);
    Ok(samples)
}

pub(crate) fn edge_fade_samples(sample_rate: u32) -> usize {
    (EDGE_FADE_SECS * sample_rate as f32).round() as usize
}

/// Phase-continuous sine source; switching frequency never jumps the phase
struct Oscillator {
    sample_rate: f64,
    phase: f64,
}

impl Oscillator {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f64,
            phase: 0.0,
        }
    }

    fn emit(&mut self, freq: f32, len: usize, out: &mut Vec<f32>) {
        let step = 2.0 * PI * freq as f64 / self.sample_rate;
        for _ in 0..len {
            out.push(TONE_AMPLITUDE * self.phase.sin() as f32);
            self.phase = (self.phase + step) % (2.0 * PI);
        }
    }
}

/// Raised-cosine attack and decay over `fade` samples at each end
fn apply_edge_fade(samples: &mut [f32], fade: usize) {
    let len = samples.len();
    if fade == 0 || len < 2 * fade {
        return;
    }
    for i in 0..fade {
        let progress = i as f64 / fade as f64;
        let weight = (PI * progress / 2.0).sin().powi(2) as f32;
        samples[i] *= weight;
        samples[len - 1 - i] *= weight;
    }
}
