//! Log-line classification for progress display.
//!
//! Purely presentational: nothing here influences pipeline control flow.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// One row of the classification table.
#[derive(Debug, Clone)]
pub struct ProgressTest {
    pattern: Regex,
    phase: String,
}

impl ProgressTest {
    /// Case-insensitive `pattern` mapped to `phase`.
    pub fn new(pattern: &str, phase: impl Into<String>) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                Error::validation_invalid_argument("pattern", e.to_string(), Some(pattern.to_string()), None)
            })?;

        Ok(Self {
            pattern,
            phase: phase.into(),
        })
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }
}

static DEFAULT_TESTS: LazyLock<Vec<ProgressTest>> = LazyLock::new(|| {
    [
        (r"Invoking goal hook: pre", "pre-hook"),
        (r"Invoking goal hook: post", "post-hook"),
    ]
    .into_iter()
    .filter_map(|(pattern, phase)| ProgressTest::new(pattern, phase).ok())
    .collect()
});

/// Ordered table of tests; the first match wins.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tests: Vec<ProgressTest>,
}

impl ProgressReporter {
    pub fn new(tests: Vec<ProgressTest>) -> Self {
        Self { tests }
    }

    pub fn classify(&self, line: &str) -> Option<&str> {
        self.tests
            .iter()
            .find(|t| t.matches(line))
            .map(|t| t.phase())
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(DEFAULT_TESTS.clone())
    }
}

/// Classify a line against the default table.
pub fn classify(line: &str) -> Option<&'static str> {
    DEFAULT_TESTS
        .iter()
        .find(|t| t.matches(line))
        .map(|t| t.phase())
}
