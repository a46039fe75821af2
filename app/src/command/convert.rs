use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use templar_core::ChatMessage;
use tracing::info;

/// Input for the convert command.
#[derive(Debug, Clone)]
pub struct ConvertInput {
    /// YAML file of `{input, output}` pairs
    pub input: PathBuf,
    /// Destination; defaults to the input path with a `.jsonl` extension
    pub output: Option<PathBuf>,
}

/// Strategy for turning question/answer pairs into chat-format JSONL.
#[derive(Debug, Clone, Copy)]
pub struct ConvertStrategy;

#[derive(Debug, Deserialize)]
struct TrainingPair {
    input: String,
    output: String,
}

#[derive(Debug, Serialize)]
struct TrainingRecord {
    messages: [ChatMessage; 2],
}

impl super::CommandStrategy for ConvertStrategy {
    type Input = ConvertInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let output = input
            .output
            .unwrap_or_else(|| default_output_path(&input.input));

        let yaml = std::fs::read_to_string(&input.input)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", input.input.display()))?;
        let jsonl = convert_pairs(&yaml)?;
        let count = jsonl.lines().count();

        std::fs::write(&output, jsonl)?;
        info!("Converted {count} pairs into {}", output.display());
        println!("✓ Wrote {count} records to {}", output.display());

        Ok(())
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("jsonl")
}

/// Convert a YAML list of `{input, output}` pairs into one chat record per line.
fn convert_pairs(yaml: &str) -> anyhow::Result<String> {
    let pairs: Vec<TrainingPair> = serde_yaml::from_str(yaml)?;

    let mut out = String::new();
    for pair in pairs {
        let record = TrainingRecord {
            messages: [
                ChatMessage::user(pair.input),
                ChatMessage::assistant(pair.output),
            ],
        };
        writeln!(out, "{}", serde_json::to_string(&record)?)?;
    }
    Ok(out)
}
