//! Coverage report scanning
//!
//! Pulls a single `line-rate="<decimal>"` value out of a coverage report
//! (Cobertura-style). This is a string-pattern matcher, not an XML parser:
//! the first well-formed attribute in the first report wins.

use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Attribute marker looked for in report lines.
const LINE_RATE_MARKER: &str = "line-rate=\"";

/// Default report file name emitted by the XPlat coverage collector.
pub const DEFAULT_REPORT_FILE_NAME: &str = "coverage.cobertura.xml";

/// A line-coverage ratio in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CoverageMeasurement {
    pub ratio: f64,
}

impl CoverageMeasurement {
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    /// No report, or no usable attribute in it.
    pub fn unavailable() -> Self {
        Self { ratio: 0.0 }
    }

    /// Ratio as a percentage, for display.
    pub fn percent(&self) -> f64 {
        self.ratio * 100.0
    }

    /// Scan report text; missing marker means zero coverage.
    pub fn from_report_text(text: &str) -> Self {
        text.lines()
            .find_map(parse_line_rate)
            .map(Self::new)
            .unwrap_or_else(Self::unavailable)
    }
}

/// Extract the line-rate value from a single line, if it carries one.
///
/// Lines whose quoted value isn't a decimal in `[0, 1]` are treated as if the
/// marker were absent.
pub fn parse_line_rate(line: &str) -> Option<f64> {
    let start = line.find(LINE_RATE_MARKER)? + LINE_RATE_MARKER.len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    let value: f64 = rest[..end].trim().parse().ok()?;
    if (0.0..=1.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// All files named `file_name` under `results_dir`, sorted by path.
pub fn find_reports(results_dir: &Path, file_name: &str) -> Vec<PathBuf> {
    if !results_dir.exists() {
        return Vec::new();
    }
    let mut reports: Vec<PathBuf> = WalkDir::new(results_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == file_name)
        .map(|e| e.into_path())
        .collect();
    reports.sort();
    reports
}

/// Read one report line by line, stopping at the first match.
pub fn read_report(path: &Path) -> std::io::Result<CoverageMeasurement> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        if let Some(ratio) = parse_line_rate(&line?) {
            return Ok(CoverageMeasurement::new(ratio));
        }
    }
    Ok(CoverageMeasurement::unavailable())
}

/// Coverage observed in a results directory.
///
/// Only the first discovered report is read. Missing or unreadable reports
/// degrade to zero coverage with a warning; they never fail the pipeline.
pub fn measure(results_dir: &Path, file_name: &str) -> CoverageMeasurement {
    let reports = find_reports(results_dir, file_name);
    let Some(first) = reports.first() else {
        tracing::warn!(
            dir = %results_dir.display(),
            "no {} found; treating coverage as 0",
            file_name
        );
        return CoverageMeasurement::unavailable();
    };

    match read_report(first) {
        Ok(measurement) => {
            tracing::debug!(report = %first.display(), ratio = measurement.ratio, "parsed coverage report");
            measurement
        }
        Err(err) => {
            tracing::warn!(report = %first.display(), "failed to read coverage report: {}", err);
            CoverageMeasurement::unavailable()
        }
    }
}
