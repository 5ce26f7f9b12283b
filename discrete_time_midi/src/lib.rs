// Discrete-Time MIDI Serializer
//
// A bidirectional codec between MIDI performances and a fixed vocabulary of
// integer tokens for sequence models. A performance is reduced to note-on
// and note-off events on one merged timeline; time between events becomes a
// chain of quantized wait tokens.
//
// Token layout (see token.rs):
//   [0, 128)                    note-on, pitch = token
//   [128, 256)                  note-off, pitch = token - 128
//   [256, 256 + wait_classes)   wait of (token - 256 + 1) / samples seconds
//
// Architecture:
// - event.rs: `NoteEvent`, the absolute-time note-on/note-off record
// - token.rs: `Vocabulary` and `TokenKind`, the integer <-> meaning mapping
// - config.rs: JSON-loadable `CodecConfig` (quantization + MIDI output)
// - extract.rs: SMF parsing, per-track tick accumulation, explicit k-way
//   track merge, note pairing, tempo map
// - codec.rs: `DiscreteTimeCodec`, the step-quantized encode/decode
// - container.rs: single-track SMF output
// - serializer.rs: `DiscreteTimeSerializer`, file-level serialize/deserialize
// - token_file.rs: JSON token sequences tagged with their vocabulary
// - corpus.rs: parallel batch serialization and round-trip checks
// - error.rs: `CodecError` and `Result`
//
// The codec is deterministic: the same file and configuration always yield
// the same tokens.

pub mod codec;
pub mod config;
pub mod container;
pub mod corpus;
pub mod error;
pub mod event;
pub mod extract;
pub mod serializer;
pub mod token;
pub mod token_file;

pub use codec::DiscreteTimeCodec;
pub use config::CodecConfig;
pub use error::{CodecError, Result};
pub use event::{NoteEvent, NoteKind};
pub use serializer::DiscreteTimeSerializer;
pub use token::Token;
