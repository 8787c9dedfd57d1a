//! Outcomes and aggregated results handed to reporters

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{HarnessResult, TestError};

/// Coarse classification, convenient for comparisons and counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The server answered, but not as required
    Assertion,
    /// The server could not be reached or did not answer in time
    Transport,
    /// The response body could not be decoded
    Decode,
    /// The test body panicked
    Panic,
    /// The test exceeded its deadline
    Timeout,
    /// The suite hook failed before the test could run
    Setup,
    /// Any other error returned by the test body
    Error,
}

/// Exactly one of these is recorded per test execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { kind: FailureKind, reason: String },
    Skipped { reason: String },
}

impl Outcome {
    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Outcome::Failed {
            kind,
            reason: reason.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Outcome::Passed => Status::Passed,
            Outcome::Failed { .. } => Status::Failed,
            Outcome::Skipped { .. } => Status::Skipped,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed { reason, .. } | Outcome::Skipped { reason } => Some(reason),
        }
    }
}

impl From<Result<(), TestError>> for Outcome {
    fn from(result: Result<(), TestError>) -> Self {
        match result {
            Ok(()) => Outcome::Passed,
            Err(TestError::Skipped(reason)) => Outcome::Skipped { reason },
            Err(e) => {
                let kind = match &e {
                    TestError::Assertion(_) => FailureKind::Assertion,
                    TestError::Transport(_) => FailureKind::Transport,
                    TestError::Decode(_) => FailureKind::Decode,
                    TestError::Skipped(_) | TestError::Other(_) => FailureKind::Error,
                };
                Outcome::failed(kind, e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub suite: String,
    pub name: String,
    pub description: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
}

impl TestCaseResult {
    pub fn status(&self) -> Status {
        self.outcome.status()
    }
}

/// Pass/fail/skip counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Passed => self.passed += 1,
            Status::Failed => self.failed += 1,
            Status::Skipped => self.skipped += 1,
        }
    }

    fn merge(&mut self, other: Summary) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped ({} total)",
            self.passed, self.failed, self.skipped, self.total
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub title: String,
    pub description: String,
    pub spec_url: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub tests: Vec<TestCaseResult>,
}

impl SuiteResult {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for test in &self.tests {
            summary.record(test.status());
        }
        summary
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.tests.iter().map(TestCaseResult::status).collect()
    }

    pub fn test(&self, name: &str) -> Option<&TestCaseResult> {
        self.tests.iter().find(|t| t.name == name)
    }
}

/// Everything a reporter needs: every registered test, exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub suites: Vec<SuiteResult>,
}

impl RunResult {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for suite in &self.suites {
            summary.merge(suite.summary());
        }
        summary
    }

    /// No test failed. Skips do not count against a run.
    pub fn is_success(&self) -> bool {
        self.summary().failed == 0
    }

    pub fn suite(&self, title: &str) -> Option<&SuiteResult> {
        self.suites.iter().find(|s| s.title == title)
    }

    pub fn outcome(&self, suite: &str, test: &str) -> Option<&Outcome> {
        self.suite(suite)?.test(test).map(|t| &t.outcome)
    }

    pub fn tests(&self) -> impl Iterator<Item = &TestCaseResult> {
        self.suites.iter().flat_map(|s| s.tests.iter())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestCaseResult> {
        self.tests().filter(|t| t.status() == Status::Failed)
    }

    /// Write the results as pretty JSON, creating parent directories
    pub fn write_json(&self, path: &Path) -> HarnessResult<PathBuf> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path.to_path_buf())
    }
}
