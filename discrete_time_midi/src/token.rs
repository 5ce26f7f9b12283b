// The token vocabulary.
//
// Tokens are plain `u32`s so the sequence model can treat them as opaque
// class indices. The vocabulary is partitioned into three disjoint ranges:
//
//   [0, 128)                      note-on, pitch = token
//   [128, 256)                    note-off, pitch = token - 128
//   [256, 256 + wait_classes)     wait, class = token - 256,
//                                 advancing the clock by class + 1 steps
//
// `Vocabulary::classify` and `Vocabulary::token` are the only places that
// translate between integers and meanings; the codec never does offset
// arithmetic on its own.

use crate::error::{CodecError, Result};
use crate::event::{MAX_PITCH, NoteEvent, NoteKind};

pub type Token = u32;

/// First note-off token.
pub const NOTE_OFF_OFFSET: u32 = 128;

/// First wait token.
pub const WAIT_OFFSET: u32 = 256;

/// Decoded meaning of one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    NoteOn(u8),
    NoteOff(u8),
    /// Wait class index; the clock advances by `index + 1` steps.
    Wait(u32),
}

impl TokenKind {
    pub fn from_event(event: &NoteEvent) -> Self {
        match event.kind {
            NoteKind::NoteOn => TokenKind::NoteOn(event.pitch),
            NoteKind::NoteOff => TokenKind::NoteOff(event.pitch),
        }
    }
}

/// Token layout for a given number of wait classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vocabulary {
    wait_classes: u32,
}

impl Vocabulary {
    pub fn new(wait_classes: u32) -> Result<Self> {
        if wait_classes == 0 {
            return Err(CodecError::InvalidConfiguration(
                "wait_classes must be at least 1".into(),
            ));
        }
        if wait_classes > u32::MAX - WAIT_OFFSET {
            return Err(CodecError::InvalidConfiguration(format!(
                "wait_classes {wait_classes} overflows the token range"
            )));
        }
        Ok(Vocabulary { wait_classes })
    }

    pub fn wait_classes(&self) -> u32 {
        self.wait_classes
    }

    /// Total number of distinct tokens.
    pub fn size(&self) -> u32 {
        WAIT_OFFSET + self.wait_classes
    }

    /// Classify a token. `position` is only used for error reporting.
    pub fn classify(&self, token: Token, position: usize) -> Result<TokenKind> {
        match token {
            t if t < NOTE_OFF_OFFSET => Ok(TokenKind::NoteOn(t as u8)),
            t if t < WAIT_OFFSET => Ok(TokenKind::NoteOff((t - NOTE_OFF_OFFSET) as u8)),
            t if t < self.size() => Ok(TokenKind::Wait(t - WAIT_OFFSET)),
            t => Err(CodecError::InvalidToken {
                token: t,
                position,
                vocab_size: self.size(),
            }),
        }
    }

    /// Encode a token kind. Pitches must be at most 127 and wait classes in
    /// range; the codec checks both before calling this.
    pub fn token(&self, kind: TokenKind) -> Token {
        match kind {
            TokenKind::NoteOn(pitch) => {
                debug_assert!(pitch <= MAX_PITCH);
                u32::from(pitch)
            }
            TokenKind::NoteOff(pitch) => {
                debug_assert!(pitch <= MAX_PITCH);
                NOTE_OFF_OFFSET + u32::from(pitch)
            }
            TokenKind::Wait(class) => {
                debug_assert!(class < self.wait_classes);
                WAIT_OFFSET + class
            }
        }
    }

    /// Token for a wait of `steps` steps, `1 <= steps <= wait_classes`.
    pub fn wait_token(&self, steps: u32) -> Token {
        debug_assert!((1..=self.wait_classes).contains(&steps));
        self.token(TokenKind::Wait(steps - 1))
    }
}
