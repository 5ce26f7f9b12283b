// File-level serialize/deserialize.
//
// `DiscreteTimeSerializer` pairs a codec with the MIDI output settings and
// exposes the two operations the sequence model consumes:
//
//   serialize(path)                              -> Vec<Token>
//   deserialize(tokens, output_dir, filename)    -> writes output_dir/filename
//
// Deserialize decodes the full token sequence before touching the file
// system, so an invalid token never leaves a partial file behind.

use crate::codec::DiscreteTimeCodec;
use crate::config::{CodecConfig, MidiOutputConfig};
use crate::container::write_midi;
use crate::error::Result;
use crate::extract::extract;
use crate::token::Token;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteTimeSerializer {
    codec: DiscreteTimeCodec,
    output: MidiOutputConfig,
}

impl DiscreteTimeSerializer {
    pub fn new(config: &CodecConfig) -> Result<Self> {
        config.validate()?;
        Ok(DiscreteTimeSerializer {
            codec: DiscreteTimeCodec::from_config(config)?,
            output: config.output.clone(),
        })
    }

    /// Serializer with default output settings and the given vocabulary.
    pub fn with_wait_classes(wait_classes: u32) -> Result<Self> {
        Self::new(&CodecConfig {
            wait_classes,
            ..Default::default()
        })
    }

    pub fn codec(&self) -> &DiscreteTimeCodec {
        &self.codec
    }

    pub fn output(&self) -> &MidiOutputConfig {
        &self.output
    }

    /// Quantization steps per second.
    pub fn samples(&self) -> f64 {
        self.codec.samples()
    }

    /// Read a MIDI file and encode it as tokens.
    pub fn serialize(&self, path: &Path) -> Result<Vec<Token>> {
        let events = extract(path)?;
        self.codec.encode(&events)
    }

    /// Decode tokens and write them as `output_dir/filename`. Returns the
    /// written path. The directory must already exist.
    pub fn deserialize(
        &self,
        tokens: &[Token],
        output_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf> {
        let events = self.codec.decode(tokens)?;
        let path = output_dir.join(filename);
        write_midi(&events, &self.output, &path)?;
        Ok(path)
    }
}
