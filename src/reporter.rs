//! Per-combination log sink
//!
//! One append-only file per (browser, viewport) at
//! `{log_dir}/{browser}/{width}x{height}.log`. Every line is mirrored to
//! tracing so the console shows the same stream.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::errors::{CheckError, CheckResult};
use crate::report::{AssertionResult, Combination, CombinationFailure, Outcome, RunResult};
use crate::screenshot::path_segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Log file path for a combination
pub fn log_path(log_dir: &Path, combination: &Combination) -> PathBuf {
    log_dir
        .join(path_segment(&combination.browser))
        .join(format!("{}.log", combination.viewport))
}

pub struct CombinationLog {
    combination: Combination,
    path: PathBuf,
    file: Mutex<File>,
}

impl CombinationLog {
    /// Open (creating directories as needed) the combination's log in append mode
    pub fn open(log_dir: &Path, combination: &Combination) -> CheckResult<Self> {
        let path = log_path(log_dir, combination);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CheckError::storage(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CheckError::storage(&path, e))?;

        Ok(CombinationLog {
            combination: combination.clone(),
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: impl AsRef<str>) -> CheckResult<()> {
        self.line(Level::Info, message.as_ref())
    }

    pub fn warn(&self, message: impl AsRef<str>) -> CheckResult<()> {
        self.line(Level::Warn, message.as_ref())
    }

    pub fn error(&self, message: impl AsRef<str>) -> CheckResult<()> {
        self.line(Level::Error, message.as_ref())
    }

    /// Append one line to the file and mirror it to the console
    pub fn line(&self, level: Level, message: &str) -> CheckResult<()> {
        let browser = self.combination.browser.as_str();
        let viewport = self.combination.viewport.to_string();
        match level {
            Level::Info => info!(browser, viewport = %viewport, "{}", message),
            Level::Warn => warn!(browser, viewport = %viewport, "{}", message),
            Level::Error => error!(browser, viewport = %viewport, "{}", message),
        }

        let stamp = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Multi-line messages stay one event per line in the file
        for part in message.lines() {
            writeln!(file, "{} {} {}", stamp, level.as_str(), part)
                .map_err(|e| CheckError::storage(&self.path, e))?;
        }
        Ok(())
    }

    /// Log a run result using the pass/fail vocabulary of the report
    pub fn record(&self, result: &RunResult) -> CheckResult<()> {
        match result {
            RunResult::Assertion(r) => {
                let level = if r.passed() { Level::Info } else { Level::Warn };
                self.line(level, &describe_assertion(r))
            }
            RunResult::CombinationError(f) => self.line(Level::Error, &describe_failure(f)),
        }
    }
}

pub fn describe_assertion(result: &AssertionResult) -> String {
    let head = format!(
        "{}, {}, {}, {}, {}",
        result.combination.viewport,
        result.test_case,
        result.subject,
        result.assertion,
        result.kind
    );
    let property = result
        .property
        .as_deref()
        .map(|p| format!(" {}", p))
        .unwrap_or_default();

    match &result.outcome {
        Outcome::Pass => format!("Assertion passed: {}{}", head, property),
        Outcome::Fail { expected, actual } => format!(
            "Assertion failed: {}{} was expected {} but found {}",
            head, property, expected, actual
        ),
        Outcome::Error { message } => {
            format!("Assertion errored: {}{}: {}", head, property, message)
        }
    }
}

pub fn describe_failure(failure: &CombinationFailure) -> String {
    format!("ERROR: {}, {}", failure.combination.viewport, failure.error)
}

#[cfg(test)]
#[path = "reporter_test.rs"]
mod reporter_test;
