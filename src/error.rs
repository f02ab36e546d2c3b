//! Error taxonomy
//!
//! Fatal failures are `Err` values. Missing coverage data and unrecognised
//! test output are not errors; they degrade to zeroed results instead.

use crate::coverage::CoverageMeasurement;
use crate::runner::CommandOutcome;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),

    #[error("failed to read config '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request timed out after {0}s")]
    Timeout(u64),

    #[error("generation request failed")]
    Transport(#[source] reqwest::Error),

    #[error("generation API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("generation response could not be parsed")]
    Malformed(#[source] serde_json::Error),

    #[error("generation response contained no content")]
    EmptyContent,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    BaselineCoverage,
    Generate,
    Rerun,
    Report,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::BaselineCoverage => "baseline coverage",
            Stage::Generate => "generate",
            Stage::Rerun => "rerun",
            Stage::Report => "report",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("build failed: {}", .outcome.diagnostic())]
    Build { outcome: Box<CommandOutcome> },

    #[error("test generation failed")]
    Generation {
        /// Measured before generation started, still worth reporting.
        baseline: CoverageMeasurement,
        #[source]
        source: GenerationError,
    },

    #[error("{stage} stage failed on '{}'", .path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        /// Set once the baseline stage has completed.
        baseline: Option<CoverageMeasurement>,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Build { .. } => Stage::Build,
            PipelineError::Generation { .. } => Stage::Generate,
            PipelineError::Io { stage, .. } => *stage,
        }
    }

    /// Baseline coverage, if the pipeline got far enough to measure it.
    pub fn baseline(&self) -> Option<CoverageMeasurement> {
        match self {
            PipelineError::Generation { baseline, .. } => Some(*baseline),
            PipelineError::Io { baseline, .. } => *baseline,
            PipelineError::Build { .. } => None,
        }
    }
}
