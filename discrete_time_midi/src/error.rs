// Error taxonomy for the serializer.
//
// Every fallible operation in the crate returns `Result<T>` with a single
// `CodecError`. All failures are terminal for the call that produced them:
// the codec is a deterministic single-pass transform, so nothing is retried.
//
// - `MalformedInput`: the MIDI container could not be parsed or uses a
//   variant that cannot be merged into one timeline (Format 2).
// - `InvalidConfiguration`: rejected at codec/config construction, never
//   clamped.
// - `InvalidToken`: an out-of-range token during decode. Decode aborts
//   before any output file is written.
// - `InvalidPitch`: a note event outside the 7-bit pitch range.
// - `SequenceTooLong`: the rests of one piece would need more wait tokens
//   than `MAX_WAIT_TOKENS`; checked before any token is allocated.
// - `TimeOverflow`: an event lies beyond the last tick the writer will
//   bridge with filler events.
// - `Io` / `Json`: propagated unchanged from std and serde_json.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed MIDI input{}: {reason}", display_path(.path))]
    MalformedInput {
        path: Option<PathBuf>,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid token {token} at position {position} (vocabulary size {vocab_size})")]
    InvalidToken {
        token: u32,
        position: usize,
        vocab_size: u32,
    },

    #[error("invalid pitch {pitch} at event {position} (must be 0..=127)")]
    InvalidPitch { pitch: u8, position: usize },

    #[error("event at {seconds:.3}s needs {wait_tokens} wait tokens, beyond the limit of {limit}")]
    SequenceTooLong {
        seconds: f64,
        wait_tokens: u64,
        limit: u64,
    },

    #[error("event at {seconds:.3}s falls on tick {tick}, beyond the writable range of {limit} ticks")]
    TimeOverflow { seconds: f64, tick: u64, limit: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;

impl CodecError {
    /// Attach the offending file to a `MalformedInput` raised while the path
    /// was not yet known (e.g. from `extract_bytes`).
    pub fn with_path(self, new_path: impl Into<PathBuf>) -> Self {
        match self {
            CodecError::MalformedInput { path: None, reason } => CodecError::MalformedInput {
                path: Some(new_path.into()),
                reason,
            },
            other => other,
        }
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" ({})", p.display()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_input_message_includes_path_when_known() {
        let err = CodecError::MalformedInput {
            path: None,
            reason: "bad header".into(),
        };
        assert_eq!(err.to_string(), "malformed MIDI input: bad header");

        let err = err.with_path("song.mid");
        assert_eq!(err.to_string(), "malformed MIDI input (song.mid): bad header");
    }

    #[test]
    fn with_path_keeps_existing_path_and_other_variants() {
        let err = CodecError::MalformedInput {
            path: Some("a.mid".into()),
            reason: "x".into(),
        }
        .with_path("b.mid");
        assert!(err.to_string().contains("a.mid"));

        let err = CodecError::InvalidConfiguration("samples".into()).with_path("c.mid");
        assert!(matches!(err, CodecError::InvalidConfiguration(_)));
    }

    #[test]
    fn invalid_token_message() {
        let err = CodecError::InvalidToken {
            token: 400,
            position: 3,
            vocab_size: 384,
        };
        assert_eq!(
            err.to_string(),
            "invalid token 400 at position 3 (vocabulary size 384)"
        );
    }
}
