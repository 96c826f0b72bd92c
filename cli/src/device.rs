//! Live capture and playback through cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tonelink_core::{AudioSink, AudioSource, ModemError, Result};

/// Captured audio kept while nobody reads it
const MAX_BACKLOG_SECS: usize = 30;

/// Extra wait beyond the chunk's own duration before a read returns short
const READ_GRACE: Duration = Duration::from_millis(500);

struct Shared {
    samples: Mutex<VecDeque<f32>>,
    changed: Condvar,
}

impl Shared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            samples: Mutex::new(VecDeque::new()),
            changed: Condvar::new(),
        })
    }
}

fn device_error(context: &str, err: impl std::fmt::Display) -> ModemError {
    ModemError::Device(format!("{}: {}", context, err))
}

fn stream_config(sample_rate: u32) -> cpal::StreamConfig {
    cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    }
}

fn find_device(
    devices: impl Iterator<Item = cpal::Device>,
    default: Option<cpal::Device>,
    name: Option<&str>,
) -> Result<cpal::Device> {
    match name {
        Some(wanted) => devices
            .into_iter()
            .find(|device| device.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| ModemError::Device(format!("no audio device named {:?}", wanted))),
        None => default.ok_or_else(|| ModemError::Device("no default audio device".to_string())),
    }
}

/// Microphone capture
pub struct DeviceSource {
    shared: Arc<Shared>,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl DeviceSource {
    pub fn open(name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|err| device_error("listing input devices", err))?;
        let device = find_device(devices, host.default_input_device(), name)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        tracing::info!("Using input device: {}", device_name);

        let shared = Shared::new();
        let writer = Arc::clone(&shared);
        let backlog = MAX_BACKLOG_SECS * sample_rate as usize;

        let stream = device
            .build_input_stream(
                &stream_config(sample_rate),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut samples) = writer.samples.lock() {
                        samples.extend(data.iter().copied());
                        let excess = samples.len().saturating_sub(backlog);
                        samples.drain(..excess);
                        writer.changed.notify_all();
                    }
                },
                |err| tracing::error!("Audio input error: {}", err),
                None,
            )
            .map_err(|err| device_error(&device_name, err))?;
        stream.play().map_err(|err| device_error(&device_name, err))?;

        Ok(Self {
            shared,
            sample_rate,
            _stream: stream,
        })
    }
}

impl AudioSource for DeviceSource {
    fn read_chunk(&mut self, len: usize) -> Result<Vec<f32>> {
        let wait = Duration::from_secs_f64(len as f64 / self.sample_rate as f64) + READ_GRACE;
        let samples = self
            .shared
            .samples
            .lock()
            .map_err(|_| ModemError::Device("capture buffer poisoned".to_string()))?;
        let (mut samples, _) = self
            .shared
            .changed
            .wait_timeout_while(samples, wait, |samples| samples.len() < len)
            .map_err(|_| ModemError::Device("capture buffer poisoned".to_string()))?;

        let take = len.min(samples.len());
        Ok(samples.drain(..take).collect())
    }

    fn discard_pending(&mut self) -> Result<()> {
        let mut samples = self
            .shared
            .samples
            .lock()
            .map_err(|_| ModemError::Device("capture buffer poisoned".to_string()))?;
        tracing::debug!("Dropping {} captured samples", samples.len());
        samples.clear();
        Ok(())
    }
}

/// Speaker playback; `play` returns once the frame has been handed to the device
pub struct DeviceSink {
    shared: Arc<Shared>,
    _stream: cpal::Stream,
}

impl DeviceSink {
    pub fn open(name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|err| device_error("listing output devices", err))?;
        let device = find_device(devices, host.default_output_device(), name)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        tracing::info!("Using output device: {}", device_name);

        let shared = Shared::new();
        let reader = Arc::clone(&shared);

        let stream = device
            .build_output_stream(
                &stream_config(sample_rate),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Ok(mut samples) = reader.samples.lock() {
                        for out in data.iter_mut() {
                            *out = samples.pop_front().unwrap_or(0.0);
                        }
                        if samples.is_empty() {
                            reader.changed.notify_all();
                        }
                    }
                },
                |err| tracing::error!("Audio output error: {}", err),
                None,
            )
            .map_err(|err| device_error(&device_name, err))?;
        stream.play().map_err(|err| device_error(&device_name, err))?;

        Ok(Self {
            shared,
            _stream: stream,
        })
    }
}

impl AudioSink for DeviceSink {
    fn play(&mut self, samples: &[f32]) -> Result<()> {
        let mut queue = self
            .shared
            .samples
            .lock()
            .map_err(|_| ModemError::Device("playback buffer poisoned".to_string()))?;
        queue.extend(samples.iter().copied());

        let _drained = self
            .shared
            .changed
            .wait_while(queue, |queue| !queue.is_empty())
            .map_err(|_| ModemError::Device("playback buffer poisoned".to_string()))?;
        Ok(())
    }
}

/// Names of every input and output device on the default host
pub fn list_devices() -> Result<(Vec<String>, Vec<String>)> {
    let host = cpal::default_host();
    let inputs = host
        .input_devices()
        .map_err(|err| device_error("listing input devices", err))?
        .filter_map(|device| device.name().ok())
        .collect();
    let outputs = host
        .output_devices()
        .map_err(|err| device_error("listing output devices", err))?
        .filter_map(|device| device.name().ok())
        .collect();
    Ok((inputs, outputs))
}
