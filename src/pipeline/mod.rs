//! Coverage-delta pipeline
//!
//! build -> baseline coverage -> generate -> rerun -> report. Strictly
//! linear: each stage feeds the next and the first fatal failure ends the run.

use crate::config::PipelineConfig;
use crate::cost::CostEstimate;
use crate::coverage::{self, CoverageMeasurement};
use crate::error::{GenerationError, PipelineError, Stage};
use crate::extract::extract_code_block;
use crate::llm::{build_test_prompt, PromptContext, TestGenerator, SAMPLE_METHOD};
use crate::report::{GeneratedArtifact, PipelineReport};
use crate::test_output::TestRunResult;
use crate::toolchain::Toolchain;
use std::fs;
use std::io;
use std::path::Path;

pub struct Pipeline<'a, T, G> {
    config: &'a PipelineConfig,
    toolchain: T,
    generator: G,
}

impl<'a, T: Toolchain, G: TestGenerator> Pipeline<'a, T, G> {
    pub fn new(config: &'a PipelineConfig, toolchain: T, generator: G) -> Self {
        Self {
            config,
            toolchain,
            generator,
        }
    }

    pub fn run(&self) -> Result<PipelineReport, PipelineError> {
        self.build()?;
        let baseline = self.baseline_coverage()?;
        let artifact = self.generate(baseline)?;
        let (test_run, improved) = self.rerun(baseline)?;

        tracing::info!(stage = %Stage::Report, "assembling report");
        let report = PipelineReport::new(baseline, artifact, test_run, improved);
        tracing::info!(
            baseline = report.baseline.ratio,
            improved = report.improved.ratio,
            delta = report.delta,
            cost_usd = report.cost.dollars,
            "pipeline complete"
        );
        Ok(report)
    }

    fn build(&self) -> Result<(), PipelineError> {
        tracing::info!(stage = %Stage::Build, "building project");
        let outcome = self.toolchain.build();
        if !outcome.success {
            return Err(PipelineError::Build {
                outcome: Box::new(outcome),
            });
        }
        Ok(())
    }

    fn baseline_coverage(&self) -> Result<CoverageMeasurement, PipelineError> {
        tracing::info!(stage = %Stage::BaselineCoverage, "measuring baseline coverage");
        let project = &self.config.project;
        let results_dir = project.baseline_results_path();
        clear_dir(&results_dir).map_err(|source| PipelineError::Io {
            stage: Stage::BaselineCoverage,
            path: results_dir.clone(),
            baseline: None,
            source,
        })?;

        // A failing baseline run still counts: zero coverage is a valid baseline.
        let outcome = self.toolchain.run_tests(&results_dir);
        if !outcome.success {
            tracing::warn!(exit_code = ?outcome.exit_code, "baseline test run did not succeed");
        }

        let baseline = coverage::measure(&results_dir, &project.report_file_name);
        tracing::info!(ratio = baseline.ratio, "baseline coverage {:.1}%", baseline.percent());
        Ok(baseline)
    }

    fn generate(&self, baseline: CoverageMeasurement) -> Result<GeneratedArtifact, PipelineError> {
        tracing::info!(stage = %Stage::Generate, "generating tests");
        let project = &self.config.project;
        let generation = &self.config.generation;

        let method = match project.method_source_path() {
            Some(path) => fs::read_to_string(&path).map_err(|source| PipelineError::Io {
                stage: Stage::Generate,
                path,
                baseline: Some(baseline),
                source,
            })?,
            None => SAMPLE_METHOD.to_string(),
        };
        let prompt = build_test_prompt(&method, &PromptContext::from(generation));

        let fail = |source: GenerationError| PipelineError::Generation { baseline, source };
        let output = self.generator.generate(&prompt).map_err(fail)?;

        let code = extract_code_block(&output.text, &generation.language);
        if code.is_empty() {
            return Err(fail(GenerationError::EmptyContent));
        }

        let cost = CostEstimate::from_usage(&output.usage);
        tracing::info!(
            input_tokens = cost.input_tokens,
            output_tokens = cost.output_tokens,
            cost_usd = cost.dollars,
            "tests generated"
        );

        let path = project.target_test_file_path();
        write_target(&path, &code).map_err(|source| PipelineError::Io {
            stage: Stage::Generate,
            path: path.clone(),
            baseline: Some(baseline),
            source,
        })?;
        tracing::info!(path = %path.display(), "wrote generated tests");

        Ok(GeneratedArtifact {
            source_text: code,
            token_usage: output.usage,
            path,
        })
    }

    fn rerun(
        &self,
        baseline: CoverageMeasurement,
    ) -> Result<(TestRunResult, CoverageMeasurement), PipelineError> {
        tracing::info!(stage = %Stage::Rerun, "rerunning tests with generated file");
        let project = &self.config.project;
        let results_dir = project.improved_results_path();
        clear_dir(&results_dir).map_err(|source| PipelineError::Io {
            stage: Stage::Rerun,
            path: results_dir.clone(),
            baseline: Some(baseline),
            source,
        })?;

        let outcome = self.toolchain.run_tests(&results_dir);
        let test_run = TestRunResult::parse(&outcome.combined_output());
        if !test_run.recognized {
            tracing::warn!("test runner output had no recognizable summary");
        }

        let improved = coverage::measure(&results_dir, &project.report_file_name);
        tracing::info!(
            ratio = improved.ratio,
            passed = test_run.passed,
            failed = test_run.failed,
            "improved coverage {:.1}%",
            improved.percent()
        );
        Ok((test_run, improved))
    }
}

/// Remove a results directory left by a previous run. Missing is fine.
fn clear_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn write_target(path: &Path, code: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, code)
}

#[cfg(test)]
mod tests;
