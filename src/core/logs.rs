//! Progress log sinks.
//!
//! The pipeline writes stage-boundary messages and streamed process output
//! one line at a time to a [`ProgressLog`]. A sink has a single writer per
//! run; fanning several runs into one destination is the host's concern.

use std::io::{self, Write};

use crate::progress::ProgressReporter;

pub trait ProgressLog: Send {
    fn write(&mut self, line: &str);
}

/// Keeps every line in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    lines: Vec<String>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

impl ProgressLog for MemoryLog {
    fn write(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// Forwards every line to another sink and accumulates the full text.
///
/// Wrapped around the provisioning step only, since that is the one whose
/// output is scraped afterwards.
pub struct OutputCapture<'a> {
    inner: &'a mut dyn ProgressLog,
    captured: String,
}

impl<'a> OutputCapture<'a> {
    pub fn new(inner: &'a mut dyn ProgressLog) -> Self {
        Self {
            inner,
            captured: String::new(),
        }
    }

    /// Take the accumulated text, leaving the capture empty.
    pub fn drain(&mut self) -> String {
        std::mem::take(&mut self.captured)
    }
}

impl ProgressLog for OutputCapture<'_> {
    fn write(&mut self, line: &str) {
        self.inner.write(line);
        self.captured.push_str(line);
        self.captured.push('\n');
    }
}

/// Writes lines to stderr and announces phase changes the reporter detects.
pub struct ConsoleLog {
    reporter: ProgressReporter,
    phase: Option<String>,
}

impl ConsoleLog {
    pub fn new(reporter: ProgressReporter) -> Self {
        Self {
            reporter,
            phase: None,
        }
    }

    pub fn phase(&self) -> Option<&str> {
        self.phase.as_deref()
    }
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new(ProgressReporter::default())
    }
}

impl ProgressLog for ConsoleLog {
    fn write(&mut self, line: &str) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        // A closed stderr must not abort the run.
        let _ = writeln!(handle, "{}", line);

        if let Some(phase) = self.reporter.classify(line) {
            if self.phase.as_deref() != Some(phase) {
                log_status!("phase", "{}", phase);
                self.phase = Some(phase.to_string());
            }
        }
    }
}
