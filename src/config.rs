//! Pipeline configuration
//!
//! Built once at startup from defaults, an optional TOML file and CLI
//! overrides, then handed to the pipeline by reference. Nothing downstream
//! reads the environment.

use crate::coverage::DEFAULT_REPORT_FILE_NAME;
use crate::error::ConfigError;
use crate::util::is_safe_relative_path;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the generation service key.
pub const API_KEY_ENV: &str = "CLAUDE_API_KEY";

/// Placeholder in test command args replaced with the stage's results dir.
pub const RESULTS_DIR_PLACEHOLDER: &str = "{results_dir}";

const CONFIG_DIR_NAME: &str = "revcov";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub project: ProjectSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Checkout root; every other relative path resolves against it.
    pub root: PathBuf,
    /// Build invocation, argv style. Runs in `root`.
    pub build_command: Vec<String>,
    /// Test + coverage invocation, argv style. Runs in `test_dir`.
    pub test_command: Vec<String>,
    pub test_dir: PathBuf,
    /// Relative to `test_dir`.
    pub baseline_results_dir: PathBuf,
    /// Relative to `test_dir`.
    pub improved_results_dir: PathBuf,
    pub report_file_name: String,
    /// Overwritten with the generated tests.
    pub target_test_file: PathBuf,
    /// Source of the method under test. Falls back to the bundled sample.
    pub method_source: Option<PathBuf>,
    pub build_timeout_secs: u64,
    pub test_timeout_secs: u64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            build_command: argv(&["dotnet", "build", "src/DemoCalc/DemoCalc.csproj", "-v", "quiet"]),
            test_command: argv(&[
                "dotnet",
                "test",
                "--collect:XPlat Code Coverage",
                "--results-directory:{results_dir}",
            ]),
            test_dir: PathBuf::from("src/DemoCalc.Tests"),
            baseline_results_dir: PathBuf::from("TestResults"),
            improved_results_dir: PathBuf::from("TestResults2"),
            report_file_name: DEFAULT_REPORT_FILE_NAME.to_string(),
            target_test_file: PathBuf::from("src/DemoCalc.Tests/ClaudeGeneratedTests.cs"),
            method_source: None,
            build_timeout_secs: 600,
            test_timeout_secs: 1_200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub api_url: String,
    pub api_version: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Fence tag the generated code is expected under.
    pub language: String,
    pub test_class: String,
    pub test_namespace: String,
    pub target_class: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_version: "2023-06-01".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 2_500,
            timeout_secs: 30,
            language: "csharp".to_string(),
            test_class: "ClaudeGeneratedTests".to_string(),
            test_namespace: "DemoCalc.Tests".to_string(),
            target_class: "DemoCalc".to_string(),
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

impl PipelineConfig {
    /// Default location: `<config dir>/revcov/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Explicit path if given, else the default path if it exists, else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let project = &self.project;
        let generation = &self.generation;

        if project.build_command.is_empty() {
            return Err(ConfigError::Invalid("build_command must not be empty".into()));
        }
        if project.test_command.is_empty() {
            return Err(ConfigError::Invalid("test_command must not be empty".into()));
        }
        for (label, dir) in [
            ("baseline_results_dir", &project.baseline_results_dir),
            ("improved_results_dir", &project.improved_results_dir),
        ] {
            if !is_safe_relative_path(dir) {
                return Err(ConfigError::Invalid(format!(
                    "{} '{}' must be relative with no traversal",
                    label,
                    dir.display()
                )));
            }
        }
        if project.baseline_results_dir == project.improved_results_dir {
            return Err(ConfigError::Invalid(
                "baseline_results_dir and improved_results_dir must differ".into(),
            ));
        }
        if project.report_file_name.trim().is_empty() {
            return Err(ConfigError::Invalid("report_file_name must not be empty".into()));
        }
        if generation.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be greater than 0".into()));
        }
        if generation.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be greater than 0".into()));
        }
        if generation.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        Ok(())
    }
}

impl ProjectSettings {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn test_dir_path(&self) -> PathBuf {
        self.resolve(&self.test_dir)
    }

    pub fn baseline_results_path(&self) -> PathBuf {
        self.test_dir_path().join(&self.baseline_results_dir)
    }

    pub fn improved_results_path(&self) -> PathBuf {
        self.test_dir_path().join(&self.improved_results_dir)
    }

    pub fn target_test_file_path(&self) -> PathBuf {
        self.resolve(&self.target_test_file)
    }

    pub fn method_source_path(&self) -> Option<PathBuf> {
        self.method_source.as_deref().map(|p| self.resolve(p))
    }

    /// Test command args with the results dir substituted in.
    pub fn test_args_for(&self, results_dir: &Path) -> Vec<String> {
        let dir = results_dir.display().to_string();
        self.test_command
            .iter()
            .map(|arg| arg.replace(RESULTS_DIR_PLACEHOLDER, &dir))
            .collect()
    }
}

/// Read the API key from the environment. Called once, in `main`.
pub fn api_key_from_env() -> Result<String, ConfigError> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(ConfigError::MissingCredential(API_KEY_ENV)),
    }
}
