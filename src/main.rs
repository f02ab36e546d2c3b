use anyhow::{Context, Result};
use clap::Parser;
use reverse_coverage::config::{api_key_from_env, PipelineConfig};
use reverse_coverage::error::PipelineError;
use reverse_coverage::llm::AnthropicClient;
use reverse_coverage::pipeline::Pipeline;
use reverse_coverage::report::{preview_lines, PipelineReport};
use reverse_coverage::toolchain::CommandToolchain;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "REVCOV_LOG";
const RULE: &str = "═══════════════════════════════════════════════════════";

#[derive(Parser, Debug)]
#[command(
    name = "revcov",
    about = "Generate unit tests with an LLM and report the coverage delta",
    version
)]
struct Args {
    /// Config file (TOML). Defaults to <config dir>/revcov/config.toml if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Project checkout root
    #[arg(long)]
    root: Option<PathBuf>,

    /// File containing the method under test (defaults to the bundled sample)
    #[arg(long)]
    method_file: Option<PathBuf>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Maximum output tokens for the generation call
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Generation request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write the full report as JSON to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Lines of generated code to preview (0 to disable)
    #[arg(long, default_value_t = 35)]
    preview: usize,
}

impl Args {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(root) = &self.root {
            config.project.root = root.clone();
        }
        if let Some(method_file) = &self.method_file {
            config.project.method_source = Some(method_file.clone());
        }
        if let Some(model) = &self.model {
            config.generation.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.generation.max_tokens = max_tokens;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.generation.timeout_secs = timeout_secs;
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new("reverse_coverage=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("✗ Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = PipelineConfig::load_or_default(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    // Read once; nothing past this point touches the environment.
    let api_key = api_key_from_env()?;
    let client = AnthropicClient::new(api_key, config.generation.clone())
        .context("Failed to create generation client")?;
    let toolchain = CommandToolchain::new(&config.project);

    println!("{}", RULE);
    println!("   REVERSE COVERAGE");
    println!("{}", RULE);
    println!("Project: {}", config.project.root.display());
    println!("Model:   {}", config.generation.model);
    println!();

    match Pipeline::new(&config, toolchain, client).run() {
        Ok(report) => {
            print_report(&report, args.preview);
            if let Some(path) = &args.output {
                report.write_json(path)?;
                println!("Report written to {}", path.display());
            }
            Ok(())
        }
        Err(err) => {
            if let Some(baseline) = err.baseline() {
                println!("Baseline coverage: {:.1}%", baseline.percent());
            }
            if let PipelineError::Build { outcome } = &err {
                let stdout = outcome.stdout_tail();
                if !stdout.trim().is_empty() {
                    eprintln!("{}", stdout);
                }
            }
            Err(err.into())
        }
    }
}

fn print_report(report: &PipelineReport, preview: usize) {
    if preview > 0 {
        println!("Generated tests ({}):", report.artifact.path.display());
        let (lines, remaining) = preview_lines(&report.artifact.source_text, preview);
        for line in lines {
            println!("{}", line);
        }
        if remaining > 0 {
            println!("... ({} more lines) ...", remaining);
        }
        println!();
    }

    let test_run = &report.test_run;
    if !test_run.recognized {
        println!("Test output had no recognizable summary; raw output follows:");
        println!("{}", test_run.raw_output);
    }

    println!("{}", RULE);
    println!("   RESULTS");
    println!("{}", RULE);
    println!("Baseline coverage:  {:5.1}%", report.baseline.percent());
    println!("Improved coverage:  {:5.1}%", report.improved.percent());
    println!("Coverage delta:     {:+5.1}%", report.delta_points());
    if test_run.recognized {
        println!("Tests passed:       {}", test_run.passed);
        println!("Tests failed:       {}", test_run.failed);
        println!("Tests run:          {}", test_run.total());
    } else {
        println!("Tests passed:       unknown");
        println!("Tests failed:       unknown");
    }
    println!("Input tokens:       {}", report.cost.input_tokens);
    println!("Output tokens:      {}", report.cost.output_tokens);
    println!("Total tokens:       {}", report.artifact.token_usage.total());
    println!("Cost:               ${:.4}", report.cost.dollars);
    println!("{}", RULE);
}
