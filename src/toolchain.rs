//! Build and test collaborators
//!
//! The pipeline talks to the compiler and test runner only through
//! [`Toolchain`], so scenarios can be exercised without a .NET SDK.

use crate::config::ProjectSettings;
use crate::runner::{run_command, CommandOutcome, CommandSpec};
use std::path::Path;

pub trait Toolchain {
    /// Compile the target project.
    fn build(&self) -> CommandOutcome;

    /// Run the test suite with coverage collection into `results_dir`.
    fn run_tests(&self, results_dir: &Path) -> CommandOutcome;
}

impl<T: Toolchain + ?Sized> Toolchain for &T {
    fn build(&self) -> CommandOutcome {
        (**self).build()
    }

    fn run_tests(&self, results_dir: &Path) -> CommandOutcome {
        (**self).run_tests(results_dir)
    }
}

/// Runs the configured build and test commands as child processes.
pub struct CommandToolchain<'a> {
    project: &'a ProjectSettings,
}

impl<'a> CommandToolchain<'a> {
    pub fn new(project: &'a ProjectSettings) -> Self {
        Self { project }
    }

    fn build_spec(&self) -> Option<CommandSpec> {
        CommandSpec::from_argv("build", &self.project.root, &self.project.build_command)
            .map(|spec| spec.timeout_secs(self.project.build_timeout_secs))
    }

    fn test_spec(&self, results_dir: &Path) -> Option<CommandSpec> {
        let argv = self.project.test_args_for(results_dir);
        CommandSpec::from_argv("test", self.project.test_dir_path(), &argv)
            .map(|spec| spec.timeout_secs(self.project.test_timeout_secs))
    }
}

fn empty_command(name: &str) -> CommandOutcome {
    CommandOutcome {
        name: name.to_string(),
        note: Some(format!("No {} command configured", name)),
        ..Default::default()
    }
}

impl Toolchain for CommandToolchain<'_> {
    fn build(&self) -> CommandOutcome {
        match self.build_spec() {
            Some(spec) => run_command(&spec),
            None => empty_command("build"),
        }
    }

    fn run_tests(&self, results_dir: &Path) -> CommandOutcome {
        match self.test_spec(results_dir) {
            Some(spec) => run_command(&spec),
            None => empty_command("test"),
        }
    }
}
