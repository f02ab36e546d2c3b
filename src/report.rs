//! Pipeline results
//!
//! One report per run. Serialisable so `--output` can write it as JSON.

use crate::cost::CostEstimate;
use crate::coverage::CoverageMeasurement;
use crate::llm::TokenUsage;
use crate::test_output::TestRunResult;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Code extracted from the model reply, plus what it cost to get.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedArtifact {
    pub source_text: String,
    pub token_usage: TokenUsage,
    /// Where the code was written.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub baseline: CoverageMeasurement,
    pub artifact: GeneratedArtifact,
    pub cost: CostEstimate,
    pub test_run: TestRunResult,
    pub improved: CoverageMeasurement,
    /// `improved - baseline`, unclamped.
    pub delta: f64,
}

impl PipelineReport {
    pub fn new(
        baseline: CoverageMeasurement,
        artifact: GeneratedArtifact,
        test_run: TestRunResult,
        improved: CoverageMeasurement,
    ) -> Self {
        let cost = CostEstimate::from_usage(&artifact.token_usage);
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            delta: coverage_delta(baseline, improved),
            baseline,
            artifact,
            cost,
            test_run,
            improved,
        }
    }

    /// Delta in percentage points, for display.
    pub fn delta_points(&self) -> f64 {
        self.delta * 100.0
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report '{}'", path.display()))
    }
}

/// Negative when the generated tests lost coverage; reported as-is.
pub fn coverage_delta(baseline: CoverageMeasurement, improved: CoverageMeasurement) -> f64 {
    improved.ratio - baseline.ratio
}

/// First `max_lines` lines numbered for console preview, plus how many were cut.
pub fn preview_lines(text: &str, max_lines: usize) -> (Vec<String>, usize) {
    let lines: Vec<&str> = text.lines().collect();
    let shown = lines
        .iter()
        .take(max_lines)
        .enumerate()
        .map(|(i, line)| format!("{:3} | {}", i + 1, line.trim_end()))
        .collect();
    (shown, lines.len().saturating_sub(max_lines))
}
