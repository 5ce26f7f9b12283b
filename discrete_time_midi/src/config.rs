// Data-driven codec configuration.
//
// `CodecConfig` holds everything that shapes the token vocabulary and the
// emitted MIDI container, loaded from JSON. Every field has a default, and
// `#[serde(default)]` lets a file override only what it cares about.
//
// The quantization parameters (`wait_classes`, `samples`) are per-instance
// values: a `DiscreteTimeCodec` copies them at construction, so codecs with
// different vocabularies can run side by side.
//
// `validate()` rejects anything the codec cannot honor rather than clamping
// it. Beyond the obvious range checks it requires the output tick rate to be
// at least one tick per quantization step; otherwise two adjacent steps can
// land on the same tick and a serialize/deserialize/serialize cycle would no
// longer reproduce the original tokens.

use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of wait classes in the default vocabulary (256 + 128 = 384 tokens).
pub const DEFAULT_WAIT_CLASSES: u32 = 128;

/// Default quantization rate in steps per second. At the default output
/// resolution (480 ticks/quarter, 120 BPM = 960 ticks/s) one step is exactly
/// 10 ticks.
pub const DEFAULT_SAMPLES: f64 = 96.0;

/// Settings for the emitted Standard MIDI File. Tempo and resolution are
/// fixed for the whole file; tempo curves are not preserved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiOutputConfig {
    /// Ticks per quarter note in the output header (1..=32767).
    pub ticks_per_quarter: u16,
    /// Microseconds per quarter note written as the file's single tempo.
    pub tempo_us_per_quarter: u32,
    /// Velocity for every note-on. Must be non-zero; a zero-velocity
    /// note-on reads back as a note-off.
    pub velocity: u8,
    /// MIDI channel (0..=15) for all notes.
    pub channel: u8,
}

impl Default for MidiOutputConfig {
    fn default() -> Self {
        MidiOutputConfig {
            ticks_per_quarter: 480,
            tempo_us_per_quarter: 500_000,
            velocity: 64,
            channel: 0,
        }
    }
}

impl MidiOutputConfig {
    /// Output ticks per second implied by the resolution and tempo.
    pub fn ticks_per_second(&self) -> f64 {
        f64::from(self.ticks_per_quarter) * 1_000_000.0 / f64::from(self.tempo_us_per_quarter)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ticks_per_quarter == 0 || self.ticks_per_quarter > 0x7FFF {
            return Err(CodecError::InvalidConfiguration(format!(
                "ticks_per_quarter must be in 1..=32767, got {}",
                self.ticks_per_quarter
            )));
        }
        if self.tempo_us_per_quarter == 0 || self.tempo_us_per_quarter > 0xFF_FFFF {
            return Err(CodecError::InvalidConfiguration(format!(
                "tempo_us_per_quarter must be in 1..=16777215, got {}",
                self.tempo_us_per_quarter
            )));
        }
        if self.velocity == 0 || self.velocity > 127 {
            return Err(CodecError::InvalidConfiguration(format!(
                "velocity must be in 1..=127, got {}",
                self.velocity
            )));
        }
        if self.channel > 15 {
            return Err(CodecError::InvalidConfiguration(format!(
                "channel must be in 0..=15, got {}",
                self.channel
            )));
        }
        Ok(())
    }
}

/// Top-level configuration for serialize/deserialize.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Number of distinct wait tokens. The longest single wait is
    /// `wait_classes / samples` seconds; longer rests chain several tokens.
    pub wait_classes: u32,
    /// Quantization steps per second. One wait class index `i` advances the
    /// clock by `(i + 1) / samples` seconds.
    pub samples: f64,
    pub output: MidiOutputConfig,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            wait_classes: DEFAULT_WAIT_CLASSES,
            samples: DEFAULT_SAMPLES,
            output: MidiOutputConfig::default(),
        }
    }
}

impl CodecConfig {
    /// Load and validate a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: CodecConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_quantization(self.wait_classes, self.samples)?;
        self.output.validate()?;
        let ticks_per_second = self.output.ticks_per_second();
        if ticks_per_second < self.samples {
            return Err(CodecError::InvalidConfiguration(format!(
                "output resolution of {ticks_per_second:.3} ticks/s is coarser than \
                 {} quantization steps/s",
                self.samples
            )));
        }
        Ok(())
    }
}

/// Checks shared by `CodecConfig::validate` and codec construction.
pub(crate) fn validate_quantization(wait_classes: u32, samples: f64) -> Result<()> {
    if wait_classes == 0 {
        return Err(CodecError::InvalidConfiguration(
            "wait_classes must be at least 1".into(),
        ));
    }
    if !samples.is_finite() || samples <= 0.0 {
        return Err(CodecError::InvalidConfiguration(format!(
            "samples must be a finite positive number, got {samples}"
        )));
    }
    Ok(())
}
