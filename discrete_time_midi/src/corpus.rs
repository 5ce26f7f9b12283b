// Batch processing over a directory of MIDI files.
//
// Files are independent, so every batch operation fans out with rayon; each
// file gets its own extract/encode call with no shared mutable state.
// Results come back in sorted path order regardless of scheduling.
//
// `check_round_trip` is the second-order round-trip used to validate a
// corpus: serialize, deserialize into a scratch directory, serialize again,
// and compare. Serializing first (rather than comparing against the raw
// file) means quantization loss in the first pass is expected; only loss in
// the second pass counts as a failure. Converted files are written with the
// `.roundtrip.smf` suffix, which `midi_files` never lists, and
// `check_corpus` refuses to use the corpus directory itself as scratch.

use crate::error::{CodecError, Result};
use crate::serializer::DiscreteTimeSerializer;
use crate::token::{Token, TokenKind, Vocabulary};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Suffix appended to a corpus file name for its converted copy.
pub const ROUND_TRIP_SUFFIX: &str = ".roundtrip.smf";

/// `*.mid` / `*.midi` files directly under `dir`, sorted by path.
pub fn midi_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_midi_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_midi_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi"))
}

/// Serialize every MIDI file in `dir` in parallel.
pub fn serialize_corpus(
    serializer: &DiscreteTimeSerializer,
    dir: &Path,
) -> Result<Vec<(PathBuf, Result<Vec<Token>>)>> {
    let files = midi_files(dir)?;
    let results: Vec<(PathBuf, Result<Vec<Token>>)> = files
        .into_par_iter()
        .map(|path| {
            let tokens = serializer.serialize(&path);
            (path, tokens)
        })
        .collect();

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    info!(
        dir = %dir.display(),
        files = results.len(),
        failed,
        "serialized corpus"
    );
    Ok(results)
}

/// Outcome of a serialize/deserialize/serialize cycle for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTripReport {
    pub path: PathBuf,
    pub first_len: usize,
    pub second_len: usize,
    /// First token index where the two sequences differ, if any. A length
    /// difference with an identical prefix reports the shorter length.
    pub first_mismatch: Option<usize>,
}

impl RoundTripReport {
    pub fn is_identical(&self) -> bool {
        self.first_mismatch.is_none()
    }
}

/// Index of the first differing token, or `None` if identical.
pub fn first_mismatch(a: &[Token], b: &[Token]) -> Option<usize> {
    match a.iter().zip(b).position(|(x, y)| x != y) {
        Some(index) => Some(index),
        None if a.len() != b.len() => Some(a.len().min(b.len())),
        None => None,
    }
}

/// Second-order round-trip of one file through `scratch_dir`.
pub fn check_round_trip(
    serializer: &DiscreteTimeSerializer,
    path: &Path,
    scratch_dir: &Path,
) -> Result<RoundTripReport> {
    let first = serializer.serialize(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CodecError::MalformedInput {
            path: Some(path.to_path_buf()),
            reason: "path has no usable file name".into(),
        })?;
    let converted = serializer.deserialize(
        &first,
        scratch_dir,
        &format!("{file_name}{ROUND_TRIP_SUFFIX}"),
    )?;
    let second = serializer.serialize(&converted)?;

    let report = RoundTripReport {
        path: path.to_path_buf(),
        first_len: first.len(),
        second_len: second.len(),
        first_mismatch: first_mismatch(&first, &second),
    };
    if let Some(index) = report.first_mismatch {
        warn!(
            path = %path.display(),
            index,
            first_len = report.first_len,
            second_len = report.second_len,
            "round-trip mismatch"
        );
    }
    Ok(report)
}

/// Round-trip every MIDI file in `dir` in parallel. `scratch_dir` must be
/// an existing directory other than `dir`.
pub fn check_corpus(
    serializer: &DiscreteTimeSerializer,
    dir: &Path,
    scratch_dir: &Path,
) -> Result<Vec<(PathBuf, Result<RoundTripReport>)>> {
    if std::fs::canonicalize(dir)? == std::fs::canonicalize(scratch_dir)? {
        return Err(CodecError::InvalidConfiguration(format!(
            "scratch directory {} is the corpus directory",
            scratch_dir.display()
        )));
    }
    let files = midi_files(dir)?;
    let results: Vec<(PathBuf, Result<RoundTripReport>)> = files
        .into_par_iter()
        .map(|path| {
            let report = check_round_trip(serializer, &path, scratch_dir);
            (path, report)
        })
        .collect();

    let identical = results
        .iter()
        .filter(|(_, r)| r.as_ref().is_ok_and(RoundTripReport::is_identical))
        .count();
    info!(
        dir = %dir.display(),
        files = results.len(),
        identical,
        "checked corpus round-trip"
    );
    Ok(results)
}

/// Token counts by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceStats {
    pub note_on: usize,
    pub note_off: usize,
    pub wait: usize,
    /// Total clock advance in quantization steps.
    pub wait_steps: u64,
}

/// Count tokens by kind. Fails on the first out-of-vocabulary token.
pub fn sequence_stats(tokens: &[Token], vocab: &Vocabulary) -> Result<SequenceStats> {
    let mut stats = SequenceStats::default();
    for (position, &token) in tokens.iter().enumerate() {
        match vocab.classify(token, position)? {
            TokenKind::NoteOn(_) => stats.note_on += 1,
            TokenKind::NoteOff(_) => stats.note_off += 1,
            TokenKind::Wait(class) => {
                stats.wait += 1;
                stats.wait_steps += u64::from(class) + 1;
            }
        }
    }
    Ok(stats)
}
