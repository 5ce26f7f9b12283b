// JSON persistence for token sequences.
//
// A `TokenFile` records the vocabulary parameters alongside the tokens so a
// sequence can always be decoded with the codec that produced it.

use crate::codec::DiscreteTimeCodec;
use crate::error::Result;
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenFile {
    pub wait_classes: u32,
    pub samples: f64,
    pub tokens: Vec<Token>,
}

impl TokenFile {
    pub fn new(codec: &DiscreteTimeCodec, tokens: Vec<Token>) -> Self {
        TokenFile {
            wait_classes: codec.wait_classes(),
            samples: codec.samples(),
            tokens,
        }
    }

    /// The codec matching this file's vocabulary.
    pub fn codec(&self) -> Result<DiscreteTimeCodec> {
        DiscreteTimeCodec::new(self.wait_classes, self.samples)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }
}
