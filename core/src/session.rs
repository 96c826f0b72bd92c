use crate::command::Command;
use crate::config::ModemConfig;
use crate::decoder::{DecodeResult, FrameDecoder};
use crate::error::{Rejection, Result};
use crate::synth::synthesize;
use std::time::{Duration, Instant};

/// Audio pulled from the capture device per decoder step
pub const DEFAULT_CHUNK_DURATION: Duration = Duration::from_secs(1);

/// Mono PCM capture at the configured sample rate
pub trait AudioSource {
    /// Block until up to `len` samples have been captured and return them.
    ///
    /// An empty chunk from a source that is not exhausted simply means nothing
    /// arrived yet.
    fn read_chunk(&mut self, len: usize) -> Result<Vec<f32>>;

    /// True once the source can never deliver more samples (end of a file)
    fn is_exhausted(&self) -> bool {
        false
    }

    /// Drop audio captured but not yet read.
    ///
    /// Called before listening after a transmission, so a source that keeps
    /// recording in the background never hands back the local speaker's own
    /// frame. Sources that only capture while read (files, blocking reads)
    /// keep the default.
    fn discard_pending(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Mono PCM playback at the configured sample rate
pub trait AudioSink {
    fn play(&mut self, samples: &[f32]) -> Result<()>;
}

/// Time source for deadlines and transmit spacing
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: AudioSource + ?Sized> AudioSource for Box<T> {
    fn read_chunk(&mut self, len: usize) -> Result<Vec<f32>> {
        (**self).read_chunk(len)
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }

    fn discard_pending(&mut self) -> Result<()> {
        (**self).discard_pending()
    }
}

impl<T: AudioSource + ?Sized> AudioSource for &mut T {
    fn read_chunk(&mut self, len: usize) -> Result<Vec<f32>> {
        (**self).read_chunk(len)
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }

    fn discard_pending(&mut self) -> Result<()> {
        (**self).discard_pending()
    }
}

impl<T: AudioSink + ?Sized> AudioSink for Box<T> {
    fn play(&mut self, samples: &[f32]) -> Result<()> {
        (**self).play(samples)
    }
}

impl<T: AudioSink + ?Sized> AudioSink for &mut T {
    fn play(&mut self, samples: &[f32]) -> Result<()> {
        (**self).play(samples)
    }
}

/// Sink for receive-only sessions
struct Discard;

impl AudioSink for Discard {
    fn play(&mut self, _samples: &[f32]) -> Result<()> {
        Ok(())
    }
}

/// One endpoint of the acoustic link.
///
/// Owns exactly one capture source and one playback sink and runs the
/// blocking send/receive pipeline on the caller's thread. Two endpoints share
/// nothing but the air between them.
pub struct Session<I, O, C = SystemClock> {
    config: ModemConfig,
    input: I,
    output: O,
    clock: C,
    chunk_duration: Duration,
    /// End of the frame most recently handed to the sink
    busy_until: Option<Instant>,
    /// Captured audio that followed the last reported frame
    carry: Vec<f32>,
}

impl<I: AudioSource, O: AudioSink> Session<I, O> {
    pub fn new(config: ModemConfig, input: I, output: O) -> Result<Self> {
        Self::with_clock(config, input, output, SystemClock)
    }
}

impl<I: AudioSource, O: AudioSink, C: Clock> Session<I, O, C> {
    pub fn with_clock(config: ModemConfig, input: I, output: O, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            input,
            output,
            clock,
            chunk_duration: DEFAULT_CHUNK_DURATION,
            busy_until: None,
            carry: Vec::new(),
        })
    }

    pub fn set_chunk_duration(&mut self, duration: Duration) {
        self.chunk_duration = duration;
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn into_parts(self) -> (I, O) {
        (self.input, self.output)
    }

    /// Transmit one frame.
    ///
    /// Waits for the previous frame to finish playing first, whether or not
    /// the sink blocks during playback.
    pub fn send(&mut self, command: Command) -> Result<()> {
        self.wait_for_playback();

        let samples = synthesize(command, &self.config)?;
        log::info!(
            "Sending {} ({:.2}s frame)",
            command,
            self.config.frame_duration().as_secs_f32()
        );

        let started = self.clock.now();
        self.output.play(&samples)?;
        self.busy_until = Some(started + self.config.frame_duration());
        Ok(())
    }

    /// Listen for one frame attempt with a fresh decoder.
    ///
    /// Returns the first accepted or rejected frame, `Timeout` once `timeout`
    /// has passed, or the decoder's end-of-input verdict if the source runs
    /// dry. The deadline is checked before every chunk and no chunk extends
    /// past it; a timeout too large to represent as a deadline never expires.
    /// Decoder state never outlives the call; only raw audio captured after a
    /// reported frame is kept for the next call.
    pub fn receive(&mut self, timeout: Duration) -> Result<DecodeResult> {
        // Our own transmission is not something to decode
        let transmitted = self.busy_until.is_some();
        self.wait_for_playback();
        if transmitted {
            self.input.discard_pending()?;
        }

        let deadline = self.clock.now().checked_add(timeout);
        let chunk_len = self.config.duration_to_samples(self.chunk_duration).max(1);
        let mut decoder = FrameDecoder::new(self.config)?;
        log::debug!("Listening for up to {:?}", timeout);

        let carried = std::mem::take(&mut self.carry);
        if let Some(result) = decoder.push(&carried)? {
            return Ok(self.conclude(decoder, result));
        }

        loop {
            let len = match deadline {
                Some(deadline) => {
                    let now = self.clock.now();
                    if now >= deadline {
                        log::info!("No frame within {:?}", timeout);
                        return Ok(DecodeResult::Rejected(Rejection::Timeout));
                    }
                    self.config.duration_to_samples(deadline - now).clamp(1, chunk_len)
                }
                None => chunk_len,
            };
            let chunk = self.input.read_chunk(len)?;

            if chunk.is_empty() && self.input.is_exhausted() {
                return Ok(decoder.finish());
            }

            if let Some(result) = decoder.push(&chunk)? {
                return Ok(self.conclude(decoder, result));
            }
        }
    }

    fn conclude(&mut self, decoder: FrameDecoder, result: DecodeResult) -> DecodeResult {
        if let DecodeResult::Rejected(reason) = &result {
            log::info!("Frame rejected: {}", reason);
        }
        self.carry = decoder.into_remainder();
        result
    }

    /// Send `command` and report whether the peer answered with `expect`
    pub fn exchange(&mut self, command: Command, expect: Command, timeout: Duration) -> Result<bool> {
        self.send(command)?;
        let result = self.receive(timeout)?;

        match result.command() {
            Some(answer) if answer == expect => Ok(true),
            Some(answer) => {
                log::warn!("Sent {}, expected {} but received {}", command, expect, answer);
                Ok(false)
            }
            None => {
                log::warn!("Sent {}, expected {}: {:?}", command, expect, result);
                Ok(false)
            }
        }
    }

    /// Answer one incoming frame.
    ///
    /// An accepted command is passed to `handler`; if it returns a reply, the
    /// reply is transmitted before returning.
    pub fn serve_once<F>(&mut self, timeout: Duration, mut handler: F) -> Result<DecodeResult>
    where
        F: FnMut(Command) -> Option<Command>,
    {
        let result = self.receive(timeout)?;
        if let Some(command) = result.command() {
            if let Some(reply) = handler(command) {
                log::info!("Replying {} to {}", reply, command);
                self.send(reply)?;
            }
        }
        Ok(result)
    }

    fn wait_for_playback(&mut self) {
        if let Some(until) = self.busy_until.take() {
            let now = self.clock.now();
            if until > now {
                self.clock.sleep(until - now);
            }
        }
    }
}

/// Play one frame on `output`.
///
/// Does not wait for a previous frame; callers sending repeatedly should use
/// a [`Session`].
pub fn send<O: AudioSink + ?Sized>(output: &mut O, command: Command, config: &ModemConfig) -> Result<()> {
    let samples = synthesize(command, config)?;
    output.play(&samples)
}

/// Receive one frame attempt from `input` on the system clock
pub fn receive<I: AudioSource + ?Sized>(
    input: &mut I,
    config: &ModemConfig,
    timeout: Duration,
) -> Result<DecodeResult> {
    Session::new(*config, input, Discard)?.receive(timeout)
}
