use super::*;
use crate::llm::{GenerationOutput, TokenUsage};
use crate::runner::CommandOutcome;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use tempfile::TempDir;

const GENERATED_REPLY: &str = "Here are the tests:\n```csharp\nusing Xunit;\nnamespace DemoCalc.Tests;\npublic class ClaudeGeneratedTests {}\n```\n";

/// Writes a canned coverage report per test run, in call order.
struct FakeToolchain {
    build_ok: bool,
    coverage_per_run: Vec<Option<f64>>,
    test_output: String,
    runs: RefCell<Vec<PathBuf>>,
}

impl FakeToolchain {
    fn new(baseline: Option<f64>, improved: Option<f64>) -> Self {
        Self {
            build_ok: true,
            coverage_per_run: vec![baseline, improved],
            test_output: "Passed!  - Failed: 0, Passed: 8, Skipped: 0, Total: 8".to_string(),
            runs: RefCell::new(Vec::new()),
        }
    }

    fn failing_build() -> Self {
        Self {
            build_ok: false,
            ..Self::new(None, None)
        }
    }
}

impl Toolchain for FakeToolchain {
    fn build(&self) -> CommandOutcome {
        CommandOutcome {
            name: "build".to_string(),
            success: self.build_ok,
            exit_code: Some(if self.build_ok { 0 } else { 1 }),
            stderr: if self.build_ok {
                String::new()
            } else {
                "error CS0103: The name 'Evalute' does not exist".to_string()
            },
            ..Default::default()
        }
    }

    fn run_tests(&self, results_dir: &Path) -> CommandOutcome {
        let index = self.runs.borrow().len();
        self.runs.borrow_mut().push(results_dir.to_path_buf());

        if let Some(Some(ratio)) = self.coverage_per_run.get(index) {
            let nested = results_dir.join(format!("run-{}", index));
            fs::create_dir_all(&nested).unwrap();
            fs::write(
                nested.join("coverage.cobertura.xml"),
                format!("<?xml version=\"1.0\"?>\n<coverage line-rate=\"{}\" branch-rate=\"0\">\n</coverage>", ratio),
            )
            .unwrap();
        }

        CommandOutcome {
            name: "test".to_string(),
            success: true,
            exit_code: Some(0),
            stdout: self.test_output.clone(),
            ..Default::default()
        }
    }
}

enum Reply {
    Text(&'static str),
    Timeout,
}

struct FakeGenerator {
    reply: Reply,
    calls: Cell<usize>,
    last_prompt: RefCell<String>,
}

impl FakeGenerator {
    fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: Cell::new(0),
            last_prompt: RefCell::new(String::new()),
        }
    }
}

impl TestGenerator for FakeGenerator {
    fn generate(&self, prompt: &str) -> Result<GenerationOutput, GenerationError> {
        self.calls.set(self.calls.get() + 1);
        *self.last_prompt.borrow_mut() = prompt.to_string();
        match self.reply {
            Reply::Text(text) => Ok(GenerationOutput {
                text: text.to_string(),
                usage: TokenUsage {
                    input_tokens: 800,
                    output_tokens: 1_900,
                },
            }),
            Reply::Timeout => Err(GenerationError::Timeout(30)),
        }
    }
}

fn config_in(dir: &TempDir) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.project.root = dir.path().to_path_buf();
    config
}

#[test]
fn test_scenario_coverage_improves() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let toolchain = FakeToolchain::new(Some(0.40), Some(0.95));
    let generator = FakeGenerator::new(Reply::Text(GENERATED_REPLY));

    let report = Pipeline::new(&config, &toolchain, &generator).run().unwrap();

    assert_eq!(report.baseline.ratio, 0.40);
    assert_eq!(report.improved.ratio, 0.95);
    assert!((report.delta - 0.55).abs() < 1e-9);
    assert!((report.delta_points() - 55.0).abs() < 1e-6);
    assert_eq!(report.test_run.passed, 8);
    assert_eq!(report.test_run.failed, 0);
    assert!(report.test_run.recognized);
    assert_eq!(report.cost.input_tokens, 800);
    assert!((report.cost.dollars - (800.0 * 0.000003 + 1_900.0 * 0.000015)).abs() < 1e-12);
    assert_eq!(generator.calls.get(), 1);

    let written = fs::read_to_string(config.project.target_test_file_path()).unwrap();
    assert!(written.starts_with("using Xunit;"));
    assert!(written.ends_with("public class ClaudeGeneratedTests {}"));
    assert_eq!(report.artifact.source_text, written);

    let runs = toolchain.runs.borrow();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0], config.project.baseline_results_path());
    assert_eq!(runs[1], config.project.improved_results_path());
}

#[test]
fn test_scenario_build_failure_skips_generation() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let toolchain = FakeToolchain::failing_build();
    let generator = FakeGenerator::new(Reply::Text(GENERATED_REPLY));

    let err = Pipeline::new(&config, &toolchain, &generator).run().unwrap_err();

    assert!(matches!(err, PipelineError::Build { .. }));
    assert_eq!(err.stage(), Stage::Build);
    assert!(err.to_string().contains("CS0103"));
    assert_eq!(generator.calls.get(), 0);
    assert!(toolchain.runs.borrow().is_empty());
    assert!(!config.project.target_test_file_path().exists());
}

#[test]
fn test_scenario_generation_timeout_keeps_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let toolchain = FakeToolchain::new(Some(0.40), Some(0.95));
    let generator = FakeGenerator::new(Reply::Timeout);

    let err = Pipeline::new(&config, &toolchain, &generator).run().unwrap_err();

    assert_eq!(err.stage(), Stage::Generate);
    assert_eq!(err.baseline(), Some(CoverageMeasurement::new(0.40)));
    assert!(matches!(
        err,
        PipelineError::Generation {
            source: GenerationError::Timeout(30),
            ..
        }
    ));
    // No rerun after a failed generation.
    assert_eq!(toolchain.runs.borrow().len(), 1);
    assert!(!config.project.target_test_file_path().exists());
}

#[test]
fn test_missing_baseline_report_is_zero() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let toolchain = FakeToolchain::new(None, Some(0.5));
    let generator = FakeGenerator::new(Reply::Text(GENERATED_REPLY));

    let report = Pipeline::new(&config, &toolchain, &generator).run().unwrap();

    assert_eq!(report.baseline.ratio, 0.0);
    assert!((report.delta - 0.5).abs() < 1e-9);
}

#[test]
fn test_regression_is_reported_as_negative_delta() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let toolchain = FakeToolchain::new(Some(0.8), Some(0.6));
    let generator = FakeGenerator::new(Reply::Text(GENERATED_REPLY));

    let report = Pipeline::new(&config, &toolchain, &generator).run().unwrap();

    assert!(report.delta < 0.0);
    assert!((report.delta + 0.2).abs() < 1e-9);
}

#[test]
fn test_unfenced_reply_written_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let toolchain = FakeToolchain::new(Some(0.4), Some(0.9));
    let generator = FakeGenerator::new(Reply::Text("  using Xunit;\npublic class T {}\n"));

    let report = Pipeline::new(&config, &toolchain, &generator).run().unwrap();

    assert_eq!(report.artifact.source_text, "using Xunit;\npublic class T {}");
}

#[test]
fn test_empty_code_block_is_generation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let toolchain = FakeToolchain::new(Some(0.4), Some(0.9));
    let generator = FakeGenerator::new(Reply::Text("```csharp\n```"));

    let err = Pipeline::new(&config, &toolchain, &generator).run().unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Generation {
            source: GenerationError::EmptyContent,
            ..
        }
    ));
}

#[test]
fn test_unrecognized_test_output_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let mut toolchain = FakeToolchain::new(Some(0.4), None);
    toolchain.test_output = "error CS1002: ; expected".to_string();
    let generator = FakeGenerator::new(Reply::Text(GENERATED_REPLY));

    let report = Pipeline::new(&config, &toolchain, &generator).run().unwrap();

    assert!(!report.test_run.recognized);
    assert!(report.test_run.raw_output.contains("CS1002"));
    assert_eq!(report.improved.ratio, 0.0);
}

#[test]
fn test_stale_results_are_cleared() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);
    let stale = config.project.improved_results_path().join("old");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("coverage.cobertura.xml"), "<coverage line-rate=\"1\">").unwrap();

    let toolchain = FakeToolchain::new(Some(0.4), None);
    let generator = FakeGenerator::new(Reply::Text(GENERATED_REPLY));

    let report = Pipeline::new(&config, &toolchain, &generator).run().unwrap();

    assert!(!stale.exists());
    assert_eq!(report.improved.ratio, 0.0);
}

#[test]
fn test_method_source_file_feeds_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(&dir);
    fs::write(
        dir.path().join("Method.cs"),
        "public static int Add(int a, int b) => a + b;",
    )
    .unwrap();
    config.project.method_source = Some(PathBuf::from("Method.cs"));

    let toolchain = FakeToolchain::new(Some(0.4), Some(0.9));
    let generator = FakeGenerator::new(Reply::Text(GENERATED_REPLY));

    Pipeline::new(&config, &toolchain, &generator).run().unwrap();

    let prompt = generator.last_prompt.borrow();
    assert!(prompt.contains("Add(int a, int b)"));
    assert!(!prompt.contains("Evaluate"));
}

#[test]
fn test_missing_method_source_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(&dir);
    config.project.method_source = Some(PathBuf::from("Nope.cs"));

    let toolchain = FakeToolchain::new(Some(0.4), Some(0.9));
    let generator = FakeGenerator::new(Reply::Text(GENERATED_REPLY));

    let err = Pipeline::new(&config, &toolchain, &generator).run().unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Io {
            stage: Stage::Generate,
            ..
        }
    ));
    assert_eq!(err.baseline(), Some(CoverageMeasurement::new(0.4)));
    assert_eq!(generator.calls.get(), 0);
}

#[test]
fn test_unwritable_target_keeps_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(&dir);
    fs::write(dir.path().join("blocker"), "not a directory").unwrap();
    config.project.target_test_file = PathBuf::from("blocker/ClaudeGeneratedTests.cs");

    let toolchain = FakeToolchain::new(Some(0.4), Some(0.9));
    let generator = FakeGenerator::new(Reply::Text(GENERATED_REPLY));

    let err = Pipeline::new(&config, &toolchain, &generator).run().unwrap_err();

    assert_eq!(err.stage(), Stage::Generate);
    assert!(matches!(err, PipelineError::Io { .. }));
    assert_eq!(err.baseline(), Some(CoverageMeasurement::new(0.4)));
    assert_eq!(generator.calls.get(), 1);
    assert_eq!(toolchain.runs.borrow().len(), 1);
}
