//! External command execution
//!
//! Build and test tools are opaque collaborators: we only look at their exit
//! status and what they print.

use crate::util::tail_chars;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const OUTPUT_TAIL_MAX_CHARS: usize = 8_000;

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, cwd: impl AsRef<Path>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.as_ref().to_path_buf(),
            timeout: Duration::from_secs(600),
        }
    }

    /// Build a spec from an argv-style list (`["dotnet", "build", ...]`).
    /// Returns `None` for an empty list.
    pub fn from_argv(name: impl Into<String>, cwd: impl AsRef<Path>, argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        let mut spec = Self::new(name, cwd, program.clone());
        spec.args = args.to_vec();
        Some(spec)
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
            .trim()
            .to_string()
    }
}

/// What happened when a command ran.
#[derive(Debug, Clone, Default)]
pub struct CommandOutcome {
    pub name: String,
    pub command: String,
    pub cwd: PathBuf,
    pub duration_ms: u64,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    /// Set when the command could not be started at all.
    pub note: Option<String>,
}

impl CommandOutcome {
    /// Standard output followed by standard error, the way test runners are read.
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    pub fn stdout_tail(&self) -> String {
        tail_chars(&self.stdout, OUTPUT_TAIL_MAX_CHARS)
    }

    pub fn stderr_tail(&self) -> String {
        tail_chars(&self.stderr, OUTPUT_TAIL_MAX_CHARS)
    }

    /// Best single piece of text to show when the command failed.
    pub fn diagnostic(&self) -> String {
        if let Some(note) = &self.note {
            return note.clone();
        }
        if self.timed_out {
            return format!("{} timed out after {} ms", self.command, self.duration_ms);
        }
        let stderr = self.stderr_tail();
        if stderr.trim().is_empty() {
            self.stdout_tail()
        } else {
            stderr
        }
    }
}

/// How long reader threads get to finish after the child is gone. A
/// grandchild that inherited the pipes can keep them open indefinitely.
const READER_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug)]
struct CommandRunResult {
    status: Option<ExitStatus>,
    stdout: String,
    stderr: String,
    timed_out: bool,
}

/// Output collected by a detached reader thread. The buffer fills as the
/// pipe is read, so a reader that never finishes still yields what it saw.
struct PipeCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

impl PipeCapture {
    fn spawn<R: Read + Send + 'static>(source: R) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let sink = Arc::clone(&buffer);
        thread::spawn(move || {
            let mut reader = BufReader::new(source);
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            }
            let _ = tx.send(());
        });
        Self { buffer, done }
    }

    /// Wait for EOF until `deadline`, then take whatever was read.
    fn collect(self, deadline: Instant) -> String {
        let wait = deadline.saturating_duration_since(Instant::now());
        if self.done.recv_timeout(wait).is_err() {
            tracing::debug!("output pipe still open after command exit; keeping partial output");
        }
        let bytes = self.buffer.lock().map(|buf| buf.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).to_string()
    }
}

fn run_command_with_timeout(
    command: &mut Command,
    timeout: Duration,
) -> Result<CommandRunResult, String> {
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to start command: {}", e))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "Failed to capture stdout".to_string())?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| "Failed to capture stderr".to_string())?;
    let stdout = PipeCapture::spawn(stdout);
    let stderr = PipeCapture::spawn(stderr);

    let start = Instant::now();
    let mut timed_out = false;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) if start.elapsed() >= timeout => {
                timed_out = true;
                let _ = child.kill();
                break child.wait().ok();
            }
            Ok(None) => thread::sleep(Duration::from_millis(50)),
            Err(e) => return Err(format!("Failed to wait for command: {}", e)),
        }
    };

    // Readers normally hit EOF right after the child exits. Background
    // processes holding the pipes only get the rest of the timeout budget.
    let grace = Instant::now() + READER_GRACE;
    let deadline = if timed_out {
        grace
    } else {
        grace.max(start + timeout)
    };

    Ok(CommandRunResult {
        status,
        stdout: stdout.collect(deadline),
        stderr: stderr.collect(deadline),
        timed_out,
    })
}

/// Run a command to completion (or timeout). Never fails: a command that
/// can't start is reported as an unsuccessful outcome with a `note`.
pub fn run_command(spec: &CommandSpec) -> CommandOutcome {
    let mut command = Command::new(&spec.program);
    command.current_dir(&spec.cwd).args(&spec.args);

    let start = Instant::now();
    let command_label = spec.label();
    tracing::debug!(command = %command_label, cwd = %spec.cwd.display(), "running {}", spec.name);

    let outcome = match run_command_with_timeout(&mut command, spec.timeout) {
        Ok(result) => {
            let success = !result.timed_out && result.status.map(|s| s.success()).unwrap_or(false);
            CommandOutcome {
                name: spec.name.clone(),
                command: command_label,
                cwd: spec.cwd.clone(),
                duration_ms: start.elapsed().as_millis() as u64,
                success,
                exit_code: result.status.and_then(|s| s.code()),
                timed_out: result.timed_out,
                stdout: result.stdout,
                stderr: result.stderr,
                note: None,
            }
        }
        Err(error) => CommandOutcome {
            name: spec.name.clone(),
            command: command_label,
            cwd: spec.cwd.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: false,
            exit_code: None,
            timed_out: false,
            stdout: String::new(),
            stderr: String::new(),
            note: Some(error),
        },
    };

    tracing::debug!(
        name = %outcome.name,
        success = outcome.success,
        exit_code = ?outcome.exit_code,
        timed_out = outcome.timed_out,
        duration_ms = outcome.duration_ms,
        "command finished"
    );
    outcome
}
