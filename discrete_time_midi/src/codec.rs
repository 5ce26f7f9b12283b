// Discrete-time codec: note events <-> tokens.
//
// The codec walks a clock over the event stream. Only wait tokens move the
// clock; note tokens are stamped with the current clock value. The clock is
// kept as an integer number of quantization steps (one step = 1 / samples
// seconds) so that long pieces accumulate no floating-point drift, and an
// event's time is only converted to steps once, on the way in.
//
// Encode quantizes each event's absolute time to the nearest step (halves
// round up). Because the clock is always a whole number of steps, that is
// the same as rounding each delta from the clock to the nearest step. The
// gap is then covered greedily: as many maximal waits (`wait_classes`
// steps) as fit, then one wait for the remainder. A single wait never
// overshoots.
//
// Encode refuses pitches above 127 and sequences whose rests would need
// more than `MAX_WAIT_TOKENS` waits; both are reported as errors before the
// offending tokens are allocated.
//
// Decode is the mirror image and does no pairing validation; an unmatched
// note-on simply produces a dangling note. Any token outside the vocabulary
// aborts the whole decode.
//
// `DiscreteTimeCodec` is an immutable `Copy` value. Two codecs with
// different vocabularies can be used side by side from any thread.

use crate::config::{CodecConfig, validate_quantization};
use crate::error::{CodecError, Result};
use crate::event::{NoteEvent, NoteKind, is_time_ordered};
use crate::token::{Token, TokenKind, Vocabulary};
use tracing::debug;

/// Upper bound on the wait tokens one encode may emit. At the default 128
/// wait classes and 96 steps/s this covers about 258 days of rest.
pub const MAX_WAIT_TOKENS: u64 = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscreteTimeCodec {
    vocab: Vocabulary,
    samples: f64,
}

impl DiscreteTimeCodec {
    /// Fails with `InvalidConfiguration` if `wait_classes` is zero or
    /// `samples` is not a finite positive number.
    pub fn new(wait_classes: u32, samples: f64) -> Result<Self> {
        validate_quantization(wait_classes, samples)?;
        Ok(DiscreteTimeCodec {
            vocab: Vocabulary::new(wait_classes)?,
            samples,
        })
    }

    pub fn from_config(config: &CodecConfig) -> Result<Self> {
        Self::new(config.wait_classes, config.samples)
    }

    pub fn vocabulary(&self) -> Vocabulary {
        self.vocab
    }

    pub fn wait_classes(&self) -> u32 {
        self.vocab.wait_classes()
    }

    pub fn samples(&self) -> f64 {
        self.samples
    }

    pub fn vocab_size(&self) -> u32 {
        self.vocab.size()
    }

    /// Duration of one quantization step in seconds.
    pub fn step_seconds(&self) -> f64 {
        1.0 / self.samples
    }

    /// Nearest step to an absolute time, halves rounding up. Negative times
    /// map to step 0.
    pub fn time_to_steps(&self, seconds: f64) -> u64 {
        let scaled = seconds * self.samples;
        if scaled.is_nan() || scaled <= 0.0 {
            return 0;
        }
        (scaled + 0.5).floor() as u64
    }

    pub fn steps_to_time(&self, steps: u64) -> f64 {
        steps as f64 / self.samples
    }

    /// Encode time-ordered events as tokens.
    ///
    /// Fails with `InvalidPitch` for a pitch above 127, and with
    /// `SequenceTooLong` once the rests so far would need more than
    /// `MAX_WAIT_TOKENS` wait tokens. The wait count for a gap is checked
    /// before any of its tokens are pushed.
    pub fn encode(&self, events: &[NoteEvent]) -> Result<Vec<Token>> {
        let max_wait = u64::from(self.wait_classes());
        let mut tokens = Vec::with_capacity(events.len() * 2);
        let mut clock: u64 = 0;
        let mut waits: u64 = 0;

        for (position, event) in events.iter().enumerate() {
            if !event.has_valid_pitch() {
                return Err(CodecError::InvalidPitch {
                    pitch: event.pitch,
                    position,
                });
            }
            let target = self.time_to_steps(event.time);
            let mut remaining = target.saturating_sub(clock);

            let needed = waits.saturating_add(remaining.div_ceil(max_wait));
            if needed > MAX_WAIT_TOKENS {
                return Err(CodecError::SequenceTooLong {
                    seconds: event.time,
                    wait_tokens: needed,
                    limit: MAX_WAIT_TOKENS,
                });
            }
            waits = needed;

            while remaining > 0 {
                let chunk = remaining.min(max_wait);
                tokens.push(self.vocab.wait_token(chunk as u32));
                clock += chunk;
                remaining -= chunk;
            }
            tokens.push(self.vocab.token(TokenKind::from_event(event)));
        }

        debug!(
            events = events.len(),
            tokens = tokens.len(),
            steps = clock,
            "encoded events"
        );
        Ok(tokens)
    }

    /// Decode tokens back into time-ordered events.
    pub fn decode(&self, tokens: &[Token]) -> Result<Vec<NoteEvent>> {
        let mut events = Vec::with_capacity(tokens.len());
        let mut clock: u64 = 0;

        for (position, &token) in tokens.iter().enumerate() {
            let (kind, pitch) = match self.vocab.classify(token, position)? {
                TokenKind::Wait(class) => {
                    clock += u64::from(class) + 1;
                    continue;
                }
                TokenKind::NoteOn(pitch) => (NoteKind::NoteOn, pitch),
                TokenKind::NoteOff(pitch) => (NoteKind::NoteOff, pitch),
            };
            events.push(NoteEvent {
                kind,
                pitch,
                time: self.steps_to_time(clock),
            });
        }

        debug_assert!(is_time_ordered(&events));
        debug!(
            tokens = tokens.len(),
            events = events.len(),
            steps = clock,
            "decoded tokens"
        );
        Ok(events)
    }
}
