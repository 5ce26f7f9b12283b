// Discrete-time MIDI serializer — CLI entry point.
//
// Usage:
//   tokenize serialize <in.mid> <out.json>
//   tokenize deserialize <tokens.json> <output_dir> <filename>
//   tokenize check <corpus_dir> <scratch_dir>
//
// Options (any position):
//   --config <FILE>       JSON CodecConfig (defaults for missing fields)
//   --wait-classes <N>    Override the number of wait classes
//   --samples <F>         Override quantization steps per second
//
// `deserialize` decodes with the vocabulary recorded in the token file, not
// the command-line one. `check` exits with status 1 if any file fails the
// serialize/deserialize/serialize round-trip. Log verbosity follows
// RUST_LOG (default: info).

use discrete_time_midi::corpus::{check_corpus, sequence_stats};
use discrete_time_midi::token_file::TokenFile;
use discrete_time_midi::{CodecConfig, DiscreteTimeSerializer, Result};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  tokenize serialize <in.mid> <out.json>
  tokenize deserialize <tokens.json> <output_dir> <filename>
  tokenize check <corpus_dir> <scratch_dir>
options: --config <FILE> --wait-classes <N> --samples <F>";

/// Flags that consume the following argument.
const VALUE_FLAGS: [&str; 3] = ["--config", "--wait-classes", "--samples"];

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let positional = positional_args(&args);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match positional.as_slice() {
        ["serialize", input, output] => cmd_serialize(&config, input, output),
        ["deserialize", tokens, dir, filename] => cmd_deserialize(&config, tokens, dir, filename),
        ["check", corpus, scratch] => cmd_check(&config, corpus, scratch),
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_serialize(config: &CodecConfig, input: &str, output: &str) -> Result<ExitCode> {
    let serializer = DiscreteTimeSerializer::new(config)?;
    let tokens = serializer.serialize(Path::new(input))?;
    let stats = sequence_stats(&tokens, &serializer.codec().vocabulary())?;

    TokenFile::new(serializer.codec(), tokens).save(Path::new(output))?;

    println!("Wrote {output}");
    println!(
        "  {} note-on, {} note-off, {} wait tokens ({:.2}s)",
        stats.note_on,
        stats.note_off,
        stats.wait,
        stats.wait_steps as f64 / serializer.samples()
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_deserialize(
    config: &CodecConfig,
    tokens: &str,
    dir: &str,
    filename: &str,
) -> Result<ExitCode> {
    let file = TokenFile::load(Path::new(tokens))?;
    let serializer = DiscreteTimeSerializer::new(&CodecConfig {
        wait_classes: file.wait_classes,
        samples: file.samples,
        output: config.output.clone(),
    })?;
    let path = serializer.deserialize(&file.tokens, Path::new(dir), filename)?;
    println!("Wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(config: &CodecConfig, corpus: &str, scratch: &str) -> Result<ExitCode> {
    let serializer = DiscreteTimeSerializer::new(config)?;
    let results = check_corpus(&serializer, Path::new(corpus), Path::new(scratch))?;

    let mut failures = 0;
    for (path, result) in &results {
        match result {
            Ok(report) if report.is_identical() => {}
            Ok(report) => {
                failures += 1;
                println!(
                    "MISMATCH {} at token {} ({} vs {} tokens)",
                    path.display(),
                    report.first_mismatch.unwrap_or_default(),
                    report.first_len,
                    report.second_len
                );
            }
            Err(e) => {
                failures += 1;
                println!("ERROR    {}: {e}", path.display());
            }
        }
    }

    println!("{} files, {} failed", results.len(), failures);
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Load `--config` (or defaults) and apply command-line overrides.
fn build_config(args: &[String]) -> Result<CodecConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => CodecConfig::load(Path::new(path))?,
        None => CodecConfig::default(),
    };
    if let Some(n) = parse_flag(args, "--wait-classes") {
        config.wait_classes = n;
    }
    if let Some(samples) = parse_flag(args, "--samples") {
        config.samples = samples;
    }
    config.validate()?;
    Ok(config)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    flag_value(args, flag).and_then(|v| v.parse().ok())
}

/// Arguments that are neither flags nor flag values.
fn positional_args(args: &[String]) -> Vec<&str> {
    let mut positional = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if VALUE_FLAGS.contains(&args[i].as_str()) {
            i += 2;
            continue;
        }
        positional.push(args[i].as_str());
        i += 1;
    }
    positional
}
