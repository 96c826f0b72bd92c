//! WAV file stand-ins for the microphone and speaker

use crate::error::CliError;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tonelink_core::{AudioSink, AudioSource, ModemError};

/// Write mono 16-bit PCM
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), CliError> {
    let mut sink = WavSink::create(path, sample_rate)?;
    sink.write(samples)?;
    sink.finish()
}

/// Read the first channel of a WAV file as samples in [-1, 1]
pub fn read_wav(path: &Path, expected_rate: u32) -> Result<Vec<f32>, CliError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    tracing::debug!(
        "Read WAV {}: {} Hz, {} channels, {} bits",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    if spec.sample_rate != expected_rate {
        return Err(CliError::SampleRateMismatch {
            path: path.to_path_buf(),
            found: spec.sample_rate,
            expected: expected_rate,
        });
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ 8..=32) => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => {
            return Err(CliError::UnsupportedFormat(format!("{:?} with {} bits", format, bits)));
        }
    };

    let channels = spec.channels.max(1) as usize;
    Ok(interleaved.into_iter().step_by(channels).collect())
}

/// Recorded capture, replayed in chunks
pub struct WavSource {
    samples: VecDeque<f32>,
}

impl WavSource {
    pub fn open(path: &Path, sample_rate: u32) -> Result<Self, CliError> {
        let samples = read_wav(path, sample_rate)?;
        tracing::info!(
            "Listening to {} ({:.1}s)",
            path.display(),
            samples.len() as f32 / sample_rate as f32
        );
        Ok(Self {
            samples: samples.into(),
        })
    }
}

impl AudioSource for WavSource {
    fn read_chunk(&mut self, len: usize) -> tonelink_core::Result<Vec<f32>> {
        let take = len.min(self.samples.len());
        Ok(self.samples.drain(..take).collect())
    }

    fn is_exhausted(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Transmissions appended to a WAV file
pub struct WavSink {
    path: PathBuf,
    writer: WavWriter<BufWriter<File>>,
}

impl WavSink {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, CliError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        Ok(Self {
            path: path.to_path_buf(),
            writer: WavWriter::create(path, spec)?,
        })
    }

    fn write(&mut self, samples: &[f32]) -> Result<(), hound::Error> {
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            self.writer.write_sample((clamped * 32767.0) as i16)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<(), CliError> {
        let path = self.path;
        self.writer.finalize()?;
        tracing::info!("Wrote {}", path.display());
        Ok(())
    }
}

impl AudioSink for WavSink {
    fn play(&mut self, samples: &[f32]) -> tonelink_core::Result<()> {
        self.write(samples)
            .map_err(|err| ModemError::Device(format!("{}: {}", self.path.display(), err)))
    }
}
