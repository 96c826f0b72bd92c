use crate::command::Command;
use crate::config::ModemConfig;
use crate::detector::{validate_samples, Goertzel, NarrowbandEstimator};
use crate::error::{Rejection, Result};
use crate::framing::FrameBits;
use crate::synth::edge_fade_samples;
use std::ops::{Range, RangeInclusive};

/// Scan windows per preamble duration
const PREAMBLE_WINDOWS: usize = 8;

/// Candidate positions per analysis window when locating a tone edge; the
/// best candidate is then refined with the same number of steps per coarse step
const EDGE_SEARCH_STEPS: u64 = 32;

/// Frame decoder states.
///
/// `Accepted` and `Rejected` are held until the next `poll`/`push`, which
/// consumes the rest of the frame and returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    ScanningPreamble,
    PreambleLocked,
    DecodingBits,
    Validating,
    Accepted,
    Rejected,
}

/// A command recovered from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub command: Command,
    /// Stream offsets from the start of the preamble to the end of the postamble
    pub span: Range<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    Accepted(Decoded),
    Rejected(Rejection),
}

impl DecodeResult {
    pub fn command(&self) -> Option<Command> {
        match self {
            DecodeResult::Accepted(decoded) => Some(decoded.command),
            DecodeResult::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            DecodeResult::Accepted(_) => None,
            DecodeResult::Rejected(reason) => Some(*reason),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, DecodeResult::Accepted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Rising,
    Falling,
}

/// A preamble-band tone that has been present since `start`
#[derive(Debug, Clone, Copy)]
struct ToneRun {
    start: u64,
    freq: f32,
}

enum Step {
    Wait,
    Continue,
    Emit(DecodeResult),
}

/// Streaming frame decoder.
///
/// Consumes arbitrary-sized chunks of a continuous capture and reports at
/// most one result per frame attempt. All positions are absolute sample
/// offsets into the stream, so results do not depend on how the caller
/// chunks its input. The decoder performs no I/O and keeps no global state.
pub struct FrameDecoder<E = Goertzel> {
    config: ModemConfig,
    estimator: E,
    state: DecoderState,
    /// Buffered samples; `buffer[0]` is stream offset `base`
    buffer: Vec<f32>,
    base: u64,
    /// Samples before this offset belong to an already reported frame
    skip_until: u64,
    scan_pos: u64,
    run: Option<ToneRun>,
    frame_start: u64,
    /// Bit clock origin: where the preamble ended
    origin: u64,
    bits: Vec<bool>,
    window: u64,
    hop: u64,
}

impl FrameDecoder<Goertzel> {
    pub fn new(config: ModemConfig) -> Result<Self> {
        Self::with_estimator(config, Goertzel::new(config.sample_rate))
    }
}

impl<E: NarrowbandEstimator> FrameDecoder<E> {
    pub fn with_estimator(config: ModemConfig, estimator: E) -> Result<Self> {
        config.validate()?;
        let window = (config.preamble_samples() / PREAMBLE_WINDOWS).max(1) as u64;
        Ok(Self {
            config,
            estimator,
            state: DecoderState::Idle,
            buffer: Vec::new(),
            base: 0,
            skip_until: 0,
            scan_pos: 0,
            run: None,
            frame_start: 0,
            origin: 0,
            bits: Vec::with_capacity(config.frame_bits()),
            window,
            hop: (window / 2).max(1),
        })
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Stream offset one past the last sample received
    pub fn position(&self) -> u64 {
        self.end()
    }

    /// Feed the next chunk of capture.
    ///
    /// Invalid samples abort the current attempt: the decoder drops everything
    /// it buffered, returns to `Idle` and reports the fault. The next chunk
    /// starts a clean attempt.
    pub fn push(&mut self, chunk: &[f32]) -> Result<Option<DecodeResult>> {
        if let Err(err) = validate_samples(chunk) {
            log::warn!("{}; discarding buffered audio", err);
            let resume = self.end() + chunk.len() as u64;
            self.reset_at(resume);
            return Err(err);
        }

        self.buffer.extend_from_slice(chunk);
        Ok(self.poll())
    }

    /// Advance on already buffered samples (e.g. a second frame that arrived in
    /// the same chunk as the first)
    pub fn poll(&mut self) -> Option<DecodeResult> {
        loop {
            let step = match self.state {
                DecoderState::Idle => self.step_idle(),
                DecoderState::ScanningPreamble => self.step_scan(),
                DecoderState::PreambleLocked => self.step_locked(),
                DecoderState::DecodingBits => self.step_bit(),
                DecoderState::Validating => self.step_validate(),
                DecoderState::Accepted | DecoderState::Rejected => self.step_finished(),
            };
            match step {
                Step::Wait => return None,
                Step::Continue => continue,
                Step::Emit(result) => return Some(result),
            }
        }
    }

    /// Declare end of input and report why no (further) frame was found.
    ///
    /// Call after `poll` has returned `None`. The decoder is reset afterwards.
    pub fn finish(&mut self) -> DecodeResult {
        let reason = match self.state {
            DecoderState::PreambleLocked | DecoderState::DecodingBits | DecoderState::Validating => {
                Rejection::Truncated
            }
            _ => Rejection::NoPreamble,
        };
        log::debug!("end of input: {}", reason);
        self.reset_at(self.end());
        DecodeResult::Rejected(reason)
    }

    /// Decode `samples` as a complete input: the first result, or the reason
    /// nothing was found once the samples run out
    pub fn decode(&mut self, samples: &[f32]) -> Result<DecodeResult> {
        match self.push(samples)? {
            Some(result) => Ok(result),
            None => Ok(self.finish()),
        }
    }

    /// Audio buffered past the end of the frame just reported.
    ///
    /// Lets a caller hand samples that arrived after a frame to a fresh
    /// decoder. Empty unless the decoder is `Accepted` or `Rejected`.
    pub fn into_remainder(self) -> Vec<f32> {
        match self.state {
            DecoderState::Accepted | DecoderState::Rejected => {
                self.slice(self.frame_end()..self.end()).to_vec()
            }
            _ => Vec::new(),
        }
    }

    /// Drop all buffered audio and return to `Idle`
    pub fn reset(&mut self) {
        self.reset_at(self.end());
    }

    fn reset_at(&mut self, offset: u64) {
        self.buffer.clear();
        self.base = offset;
        self.skip_until = offset;
        self.scan_pos = offset;
        self.run = None;
        self.bits.clear();
        self.state = DecoderState::Idle;
    }

    fn step_idle(&mut self) -> Step {
        if self.end() <= self.skip_until {
            let end = self.end();
            self.drain_to(end);
            return Step::Wait;
        }

        self.drain_to(self.skip_until);
        self.scan_pos = self.base;
        self.run = None;
        self.state = DecoderState::ScanningPreamble;
        Step::Continue
    }

    fn step_scan(&mut self) -> Step {
        let pos = self.scan_pos;

        // Edge search looks one window past the end of the current window
        if pos + 2 * self.window > self.end() {
            let margin = self.hop + 2 * self.window;
            self.drain_to(pos.saturating_sub(margin));
            return Step::Wait;
        }

        match (self.qualifying_preamble(pos), self.run) {
            (Some(freq), None) => {
                let start = self.locate_edge(Edge::Rising, freq, pos.saturating_sub(self.hop), pos + self.window);
                log::trace!("preamble tone at {:.1} Hz starts near sample {}", freq, start);
                self.run = Some(ToneRun { start, freq });
            }
            (None, Some(run)) => {
                self.run = None;
                let lo = pos.saturating_sub(self.hop).max(run.start);
                let end = self.locate_edge(Edge::Falling, run.freq, lo, pos + self.window);
                let measured = end.saturating_sub(run.start);

                if measured >= self.required_preamble_samples() {
                    log::debug!(
                        "preamble locked: {} samples at {:.1} Hz, bit clock origin {}",
                        measured,
                        run.freq,
                        end
                    );
                    self.frame_start = run.start;
                    self.origin = end;
                    self.bits.clear();
                    self.drain_to(end);
                    self.state = DecoderState::PreambleLocked;
                    return Step::Continue;
                }

                log::trace!(
                    "ignoring {}-sample tone, preamble needs {}",
                    measured,
                    self.config.preamble_samples()
                );
            }
            _ => {}
        }

        self.scan_pos = pos + self.hop;
        Step::Continue
    }

    fn step_locked(&mut self) -> Step {
        if self.end() < self.origin + self.bit_samples() {
            return Step::Wait;
        }
        self.state = DecoderState::DecodingBits;
        Step::Continue
    }

    fn step_bit(&mut self) -> Step {
        let index = self.bits.len();
        let start = self.origin + index as u64 * self.bit_samples();
        let end = start + self.bit_samples();
        if self.end() < end {
            return Step::Wait;
        }

        let tolerance = self.config.frequency_tolerance;
        let window = self.slice(start..end);
        let mark = self.estimator.band_power(window, self.config.mark_freq, tolerance);
        let space = self.estimator.band_power(window, self.config.space_freq, tolerance);

        // Never guess an ambiguous bit
        if mark.max(space) < self.config.min_signal_power {
            return self.reject(Rejection::WeakSignal { bit: index });
        }

        self.bits.push(space > mark);
        if self.bits.len() == self.config.frame_bits() {
            self.state = DecoderState::Validating;
        }
        Step::Continue
    }

    fn step_validate(&mut self) -> Step {
        let frame = match FrameBits::from_received(&self.bits, &self.config) {
            Ok(frame) => frame,
            Err(_) => return self.reject(Rejection::Truncated),
        };

        if !frame.is_consistent() {
            return self.reject(Rejection::ChecksumMismatch {
                data: frame.data_value(),
                checksum: frame.checksum_value(),
            });
        }

        let value = frame.data_value();
        match Command::from_value(value) {
            Some(command) => {
                log::info!("decoded {} at samples {}..{}", command, self.frame_start, self.frame_end());
                self.state = DecoderState::Accepted;
                Step::Emit(DecodeResult::Accepted(Decoded {
                    command,
                    span: self.frame_start..self.frame_end(),
                }))
            }
            None => self.reject(Rejection::UnknownCommand(value)),
        }
    }

    /// Consume whatever is left of the reported frame, postamble included
    fn step_finished(&mut self) -> Step {
        self.skip_until = self.frame_end();
        self.bits.clear();
        self.state = DecoderState::Idle;
        Step::Continue
    }

    fn reject(&mut self, reason: Rejection) -> Step {
        log::debug!("frame rejected: {}", reason);
        self.state = DecoderState::Rejected;
        Step::Emit(DecodeResult::Rejected(reason))
    }

    /// Peak preamble frequency if the window holds the preamble tone and
    /// neither bit tone
    fn qualifying_preamble(&self, pos: u64) -> Option<f32> {
        let window = self.slice(pos..pos + self.window);
        let tolerance = self.config.frequency_tolerance;
        let threshold = self.config.min_signal_power;

        let (freq, power) = self.estimator.band_peak(window, self.config.preamble_freq, tolerance);
        if power < threshold {
            return None;
        }

        // Broadband noise and speech light up the bit bands as well
        let mark = self.estimator.band_power(window, self.config.mark_freq, tolerance);
        let space = self.estimator.band_power(window, self.config.space_freq, tolerance);
        if mark >= threshold || space >= threshold {
            return None;
        }

        Some(freq)
    }

    /// Offset in `lo..=hi` where the tone at `freq` switches on or off.
    ///
    /// Compares the tone amplitude in the window just before each candidate
    /// with the window just after it; the step is largest at the true edge.
    /// A coarse pass over the range is followed by a fine pass around its pick.
    fn locate_edge(&self, edge: Edge, freq: f32, lo: u64, hi: u64) -> u64 {
        let lo = lo.max(self.base);
        let hi = hi.min(self.end());
        let coarse = self.edge_step();
        let fine = (coarse / EDGE_SEARCH_STEPS).max(1);

        let rough = self.best_edge(edge, freq, lo..=hi, coarse).unwrap_or(lo);
        let near = rough.saturating_sub(coarse).max(lo)..=(rough + coarse).min(hi);
        self.best_edge(edge, freq, near, fine).unwrap_or(rough)
    }

    fn best_edge(&self, edge: Edge, freq: f32, range: RangeInclusive<u64>, step: u64) -> Option<u64> {
        let span = self.window;
        let min_len = (span / 4).max(1);

        let mut best: Option<(u64, f32)> = None;
        let mut candidate = *range.start();
        while candidate <= *range.end() {
            let before = self.amplitude(candidate.saturating_sub(span)..candidate, freq, min_len);
            let after = self.amplitude(candidate..candidate + span, freq, min_len);
            if let (Some(before), Some(after)) = (before, after) {
                let score = match edge {
                    Edge::Rising => after - before,
                    Edge::Falling => before - after,
                };
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((candidate, score));
                }
            }
            candidate += step;
        }
        best.map(|(offset, _)| offset)
    }

    fn edge_step(&self) -> u64 {
        (self.window / EDGE_SEARCH_STEPS).max(1)
    }

    /// Tone amplitude over the buffered part of `range`; `None` if too little
    /// of it is buffered to be meaningful
    fn amplitude(&self, range: Range<u64>, freq: f32, min_len: u64) -> Option<f32> {
        let window = self.slice(range);
        if window.is_empty() {
            return Some(0.0);
        }
        if (window.len() as u64) < min_len {
            return None;
        }
        Some(self.estimator.power(window, freq).sqrt())
    }

    /// Shortest measured rise-to-fall span that counts as a full preamble.
    ///
    /// The rising edge is found mid-fade, so a full preamble measures about
    /// half a fade short; one coarse edge step covers the search error.
    fn required_preamble_samples(&self) -> u64 {
        let slack = edge_fade_samples(self.config.sample_rate) as u64 / 2 + self.edge_step();
        (self.config.preamble_samples() as u64).saturating_sub(slack)
    }

    fn bit_samples(&self) -> u64 {
        self.config.bit_samples() as u64
    }

    fn frame_end(&self) -> u64 {
        self.origin
            + self.config.frame_bits() as u64 * self.bit_samples()
            + self.config.postamble_samples() as u64
    }

    fn end(&self) -> u64 {
        self.base + self.buffer.len() as u64
    }

    /// Buffered samples inside `range`, clipped to what is held
    fn slice(&self, range: Range<u64>) -> &[f32] {
        let start = range.start.max(self.base).min(self.end());
        let end = range.end.min(self.end()).max(start);
        &self.buffer[(start - self.base) as usize..(end - self.base) as usize]
    }

    fn drain_to(&mut self, offset: u64) {
        let count = offset.saturating_sub(self.base).min(self.buffer.len() as u64);
        if count > 0 {
            self.buffer.drain(..count as usize);
            self.base += count;
        }
    }
}

/// One-shot decode of a complete recording with a fresh decoder
pub fn decode(samples: &[f32], config: &ModemConfig) -> Result<DecodeResult> {
    FrameDecoder::new(*config)?.decode(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{render, synthesize};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::PI;

    fn tone(freq: f32, len: usize, sample_rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn decode_all(samples: &[f32], config: &ModemConfig) -> Vec<DecodeResult> {
        let mut decoder = FrameDecoder::new(*config).unwrap();
        let mut results = Vec::new();
        if let Some(result) = decoder.push(samples).unwrap() {
            results.push(result);
            while let Some(result) = decoder.poll() {
                results.push(result);
            }
        }
        results
    }

    #[test]
    fn test_every_command_round_trips() {
        let config = ModemConfig::default();
        for command in Command::ALL {
            let samples = synthesize(command, &config).unwrap();
            let result = decode(&samples, &config).unwrap();
            assert_eq!(result.command(), Some(command), "{} decoded as {:?}", command, result);
        }
    }

    #[test]
    fn test_span_covers_the_frame() {
        let config = ModemConfig::default();
        let samples = synthesize(Command::Capture, &config).unwrap();
        match decode(&samples, &config).unwrap() {
            DecodeResult::Accepted(decoded) => {
                assert!(decoded.span.start < 500, "span starts at {}", decoded.span.start);
                let end = config.frame_samples() as i64;
                assert!(
                    (decoded.span.end as i64 - end).abs() < 441,
                    "span ends at {}, frame is {}",
                    decoded.span.end,
                    end
                );
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_back_to_back_frames_decode_in_order() {
        let config = ModemConfig::default();
        let mut samples = synthesize(Command::Capture, &config).unwrap();
        samples.extend(synthesize(Command::Done, &config).unwrap());

        let mut decoder = FrameDecoder::new(config).unwrap();
        let first = decoder.decode(&samples).unwrap();
        let second = decoder.decode(&[]).unwrap();
        assert_eq!(first.command(), Some(Command::Capture));
        assert_eq!(second.command(), Some(Command::Done));
        assert_eq!(decoder.decode(&[]).unwrap(), DecodeResult::Rejected(Rejection::NoPreamble));
    }

    #[test]
    fn test_single_bit_flips_are_checksum_mismatches() {
        let config = ModemConfig::default();
        let frame = FrameBits::for_command(Command::Ping, &config);
        for index in 0..frame.len() {
            let mut corrupted = frame.clone();
            corrupted.flip(index);
            let samples = render(&corrupted, &config).unwrap();
            let result = decode(&samples, &config).unwrap();
            assert!(
                matches!(result.rejection(), Some(Rejection::ChecksumMismatch { .. })),
                "flip at bit {} gave {:?}",
                index,
                result
            );
        }
    }

    #[test]
    fn test_unmapped_value_is_unknown_command() {
        let config = ModemConfig::default();
        for value in [0, 15] {
            let samples = render(&FrameBits::for_value(value, &config), &config).unwrap();
            assert_eq!(
                decode(&samples, &config).unwrap(),
                DecodeResult::Rejected(Rejection::UnknownCommand(value))
            );
        }
    }

    #[test]
    fn test_preamble_without_bits_is_weak_signal() {
        let config = ModemConfig::default();
        let mut samples = tone(config.preamble_freq, config.preamble_samples(), config.sample_rate);
        samples.resize(samples.len() + config.sample_rate as usize, 0.0);
        assert_eq!(
            decode(&samples, &config).unwrap(),
            DecodeResult::Rejected(Rejection::WeakSignal { bit: 0 })
        );
    }

    /// Preamble tone of `per_mille` of the nominal length, then CAPTURE's bits
    fn assert_short_preamble_never_locks(config: &ModemConfig, per_mille: usize) {
        let short = config.preamble_samples() * per_mille / 1000;
        let mut samples = tone(config.preamble_freq, short, config.sample_rate);
        samples.extend(synthesize(Command::Capture, config).unwrap()[config.preamble_samples()..].iter());
        samples.resize(samples.len() + config.sample_rate as usize, 0.0);

        let mut decoder = FrameDecoder::new(*config).unwrap();
        for chunk in samples.chunks(441) {
            assert_eq!(decoder.push(chunk).unwrap(), None, "{} samples of preamble", short);
            assert!(
                matches!(decoder.state(), DecoderState::Idle | DecoderState::ScanningPreamble),
                "decoder reached {:?} with {} samples of preamble",
                decoder.state(),
                short
            );
        }
        assert_eq!(decoder.finish(), DecodeResult::Rejected(Rejection::NoPreamble));
    }

    #[test]
    fn test_short_preamble_never_locks() {
        assert_short_preamble_never_locks(&ModemConfig::default(), 700);
    }

    #[test]
    fn test_nearly_full_preamble_never_locks() {
        let config = ModemConfig::default();
        for per_mille in [985, 990] {
            assert_short_preamble_never_locks(&config, per_mille);
        }
    }

    #[test]
    fn test_shortened_synthesized_preamble_never_locks() {
        let config = ModemConfig::default();
        let shorter = ModemConfig {
            preamble_duration: config.preamble_duration * 0.99,
            ..config
        };
        let samples = synthesize(Command::Capture, &shorter).unwrap();
        assert_eq!(decode(&samples, &config).unwrap(), DecodeResult::Rejected(Rejection::NoPreamble));
    }

    #[test]
    fn test_full_preamble_clears_the_length_check() {
        let config = ModemConfig::default();
        let decoder = FrameDecoder::new(config).unwrap();
        let required = decoder.required_preamble_samples();
        // Half a 5 ms fade plus one coarse step, under 1% of the preamble
        assert!(required > 21_800 && required < 21_900, "requires {} samples", required);
        let frame = synthesize(Command::Capture, &config).unwrap();
        assert_eq!(decode(&frame, &config).unwrap().command(), Some(Command::Capture));
    }

    #[test]
    fn test_silence_is_never_accepted() {
        let config = ModemConfig::default();
        let silence = vec![0.0; config.sample_rate as usize * 20];
        let mut decoder = FrameDecoder::new(config).unwrap();
        for chunk in silence.chunks(config.sample_rate as usize) {
            assert_eq!(decoder.push(chunk).unwrap(), None);
        }
        assert_eq!(decoder.finish(), DecodeResult::Rejected(Rejection::NoPreamble));
    }

    #[test]
    fn test_frame_survives_low_level_noise() {
        let config = ModemConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut samples = vec![0.0f32; config.sample_rate as usize];
        samples.extend(synthesize(Command::Error, &config).unwrap());
        for sample in samples.iter_mut() {
            *sample += rng.gen_range(-0.03f32..0.03);
        }
        assert_eq!(decode(&samples, &config).unwrap().command(), Some(Command::Error));
    }

    #[test]
    fn test_noise_alone_is_never_accepted() {
        let config = ModemConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let noise: Vec<f32> = (0..config.sample_rate as usize * 10)
            .map(|_| rng.gen_range(-0.3f32..0.3))
            .collect();
        assert!(decode_all(&noise, &config).iter().all(|result| !result.is_accepted()));
    }

    #[test]
    fn test_result_does_not_depend_on_chunking() {
        let config = ModemConfig::default();
        let mut samples = vec![0.0; 12_345];
        samples.extend(synthesize(Command::Pong, &config).unwrap());
        let expected = decode(&samples, &config).unwrap();
        assert_eq!(expected.command(), Some(Command::Pong));

        for chunk_size in [7, 1000, 4410, 30_000] {
            let mut decoder = FrameDecoder::new(config).unwrap();
            let mut result = None;
            for chunk in samples.chunks(chunk_size) {
                if let Some(found) = decoder.push(chunk).unwrap() {
                    result = Some(found);
                    break;
                }
            }
            assert_eq!(result.as_ref(), Some(&expected), "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn test_attenuated_and_delayed_frame_decodes() {
        let config = ModemConfig::default();
        let delay = 101_430;
        let mut samples = vec![0.0; delay];
        samples.extend(synthesize(Command::Capture, &config).unwrap().iter().map(|s| s * 0.2));
        match decode(&samples, &config).unwrap() {
            DecodeResult::Accepted(decoded) => {
                assert_eq!(decoded.command, Command::Capture);
                assert!((decoded.span.start as i64 - delay as i64).abs() < 500);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_drifted_tones_within_tolerance_decode() {
        let config = ModemConfig::default();
        let drifted = ModemConfig {
            mark_freq: config.mark_freq + 30.0,
            space_freq: config.space_freq + 30.0,
            preamble_freq: config.preamble_freq + 30.0,
            ..config
        };
        let samples = synthesize(Command::Done, &drifted).unwrap();
        assert_eq!(decode(&samples, &config).unwrap().command(), Some(Command::Done));
    }

    #[test]
    fn test_truncated_frame_is_reported() {
        let config = ModemConfig::default();
        let samples = synthesize(Command::Ping, &config).unwrap();
        let cut = config.preamble_samples() + 3 * config.bit_samples();
        assert_eq!(
            decode(&samples[..cut], &config).unwrap(),
            DecodeResult::Rejected(Rejection::Truncated)
        );
    }

    #[test]
    fn test_capture_fault_resets_decoder() {
        let config = ModemConfig::default();
        let samples = synthesize(Command::Capture, &config).unwrap();
        let mut decoder = FrameDecoder::new(config).unwrap();

        assert_eq!(decoder.push(&samples[..30_000]).unwrap(), None);
        assert_ne!(decoder.state(), DecoderState::Idle);

        let mut bad = samples[30_000..31_000].to_vec();
        bad[17] = f32::NAN;
        assert!(matches!(
            decoder.push(&bad),
            Err(crate::error::ModemError::CaptureFault { index: 17, .. })
        ));
        assert_eq!(decoder.state(), DecoderState::Idle);

        let result = decoder.decode(&samples).unwrap();
        assert_eq!(result.command(), Some(Command::Capture));
    }

    #[test]
    fn test_accepted_state_is_observable_until_next_poll() {
        let config = ModemConfig::default();
        let samples = synthesize(Command::Done, &config).unwrap();
        let mut decoder = FrameDecoder::new(config).unwrap();
        assert_eq!(decoder.state(), DecoderState::Idle);

        let result = decoder.push(&samples).unwrap();
        assert!(result.map(|r| r.is_accepted()).unwrap_or(false));
        assert_eq!(decoder.state(), DecoderState::Accepted);

        assert_eq!(decoder.poll(), None);
        assert!(matches!(decoder.state(), DecoderState::Idle | DecoderState::ScanningPreamble));
    }

    #[test]
    fn test_remainder_holds_the_next_frame() {
        let config = ModemConfig::default();
        let mut samples = synthesize(Command::Capture, &config).unwrap();
        samples.extend(synthesize(Command::Done, &config).unwrap());

        let mut decoder = FrameDecoder::new(config).unwrap();
        let first = decoder.push(&samples).unwrap();
        assert_eq!(first.and_then(|r| r.command()), Some(Command::Capture));

        let remainder = decoder.into_remainder();
        let frame = config.frame_samples() as i64;
        assert!((remainder.len() as i64 - frame).abs() < 441, "remainder of {}", remainder.len());
        assert_eq!(decode(&remainder, &config).unwrap().command(), Some(Command::Done));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ModemConfig {
            sample_rate: 0,
            ..ModemConfig::default()
        };
        assert!(FrameDecoder::new(config).is_err());
    }
}
