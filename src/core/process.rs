//! External process steps.
//!
//! A step spawns one command, streams its stdout and stderr line by line into
//! a [`ProgressLog`] as the lines arrive, and classifies the exit: code `0` is
//! the only success.
//!
//! Limits callers must plan around:
//! - No timeout. A hung command suspends the run until it exits.
//! - No cancellation. Dropping the run future does not kill the child
//!   (`kill_on_drop(false)`); hosts that need hard cancellation must
//!   supervise the process themselves.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::error::{Error, ProcessFailedDetails, Result};
use crate::logs::ProgressLog;
use crate::utils::shell;

/// Variables layered over the ambient environment for one spawn.
///
/// Overlay values win on key conflicts; every other ambient variable is
/// passed through unchanged.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Effective environment: `ambient` with this overlay merged on top.
    pub fn apply<I>(&self, ambient: I) -> BTreeMap<OsString, OsString>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut merged: BTreeMap<OsString, OsString> = ambient.into_iter().collect();
        for (key, value) in &self.vars {
            merged.insert(OsString::from(key), OsString::from(value));
        }
        merged
    }
}

// Values are secrets more often than not; only keys are printed.
impl fmt::Debug for EnvOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.vars.keys()).finish()
    }
}

/// Fully resolved invocation handed to a [`ProcessRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: EnvOverlay,
}

impl CommandSpec {
    /// Command line for logs; never includes environment values.
    pub fn display(&self) -> String {
        shell::command_line(&self.program, &self.args)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    /// Last lines of combined output, for diagnostics.
    pub captured_tail: String,
    pub description: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs one command to completion. The seam tests substitute.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec, log: &mut dyn ProgressLog) -> ProcessOutcome;
}

/// Spawns real processes with tokio.
#[derive(Debug, Clone)]
pub struct SpawnRunner {
    tail_lines: usize,
}

impl SpawnRunner {
    pub fn new(tail_lines: usize) -> Self {
        Self { tail_lines }
    }
}

impl Default for SpawnRunner {
    fn default() -> Self {
        Self::new(40)
    }
}

#[async_trait]
impl ProcessRunner for SpawnRunner {
    async fn run(&self, spec: &CommandSpec, log: &mut dyn ProgressLog) -> ProcessOutcome {
        let command_line = spec.display();

        let spawned = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .env_clear()
            .envs(spec.env.apply(std::env::vars_os()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let description = format!("Failed to run '{}': {}", command_line, e);
                log.write(&description);
                return ProcessOutcome {
                    exit_code: -1,
                    captured_tail: description.clone(),
                    description,
                };
            }
        };

        tracing::debug!(command = %command_line, pid = ?child.id(), "spawned");

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut tail = Tail::new(self.tail_lines);
        while let Some(line) = rx.recv().await {
            log.write(&line);
            tail.push(line);
        }

        let (exit_code, description) = match child.wait().await {
            Ok(status) => match status.code() {
                Some(code) => (code, format!("'{}' exited with code {}", command_line, code)),
                None => (-1, format!("'{}' was terminated by a signal", command_line)),
            },
            Err(e) => (-1, format!("Failed to wait for '{}': {}", command_line, e)),
        };

        ProcessOutcome {
            exit_code,
            captured_tail: tail.into_string(),
            description,
        }
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
        }
    }
}

/// Bounded buffer of the most recent lines.
struct Tail {
    lines: VecDeque<String>,
    limit: usize,
}

impl Tail {
    fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(limit.min(256)),
            limit,
        }
    }

    fn push(&mut self, line: String) {
        if self.limit == 0 {
            return;
        }
        if self.lines.len() == self.limit {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn into_string(self) -> String {
        Vec::from(self.lines).join("\n")
    }
}

/// A configured external command stage: program, arguments and overlay.
/// The working directory is supplied per run.
#[derive(Debug, Clone)]
pub struct ProcessStep {
    label: String,
    program: String,
    args: Vec<String>,
    env: EnvOverlay,
}

impl ProcessStep {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let program = program.into();
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let label = shell::command_line(&program, &args);

        Self {
            label,
            program,
            args,
            env: EnvOverlay::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn command(&self, cwd: &Path) -> CommandSpec {
        CommandSpec {
            program: self.program.clone(),
            args: self.args.clone(),
            cwd: cwd.to_path_buf(),
            env: self.env.clone(),
        }
    }

    /// Run to completion; any non-zero exit becomes `process.failed`.
    pub async fn run(
        &self,
        runner: &dyn ProcessRunner,
        cwd: &Path,
        log: &mut dyn ProgressLog,
    ) -> Result<ProcessOutcome> {
        let spec = self.command(cwd);
        let outcome = runner.run(&spec, log).await;

        if outcome.success() {
            return Ok(outcome);
        }

        tracing::warn!(command = %spec.display(), exit_code = outcome.exit_code, "command failed");
        Err(Error::process_failed(ProcessFailedDetails {
            command: self.label.clone(),
            exit_code: outcome.exit_code,
            description: outcome.description,
            tail: outcome.captured_tail,
        }))
    }
}
