//! Result values produced by the matrix and the aggregate run report

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{EXIT_ASSERTION_FAILED, EXIT_COMBINATION_FAILED, EXIT_SUCCESS};
use crate::types::{AssertionKind, Viewport};

/// One (browser, viewport) pair under test, tagged with the group it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    pub browser: String,
    pub group: String,
    pub viewport: Viewport,
}

impl Combination {
    pub fn new(browser: impl Into<String>, group: impl Into<String>, viewport: Viewport) -> Self {
        Combination {
            browser: browser.into(),
            group: group.into(),
            viewport,
        }
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.browser, self.viewport, self.group)
    }
}

/// Outcome of one comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail { expected: String, actual: String },
    /// The value could not be read; only this assertion is affected
    Error { message: String },
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }
}

/// Result of evaluating one assertion, or one property of a baselineDiff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub combination: Combination,
    pub test_case: String,
    /// Test case or nested locator the element was resolved for
    pub subject: String,
    pub assertion: String,
    pub kind: AssertionKind,
    /// CSS property compared, for checkCSSProperty and baselineDiff
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub outcome: Outcome,
}

impl AssertionResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_pass()
    }
}

/// A combination that could not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationFailure {
    pub combination: Combination,
    pub error: String,
}

/// Everything the matrix emits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RunResult {
    Assertion(AssertionResult),
    CombinationError(CombinationFailure),
}

impl RunResult {
    pub fn as_assertion(&self) -> Option<&AssertionResult> {
        match self {
            RunResult::Assertion(r) => Some(r),
            RunResult::CombinationError(_) => None,
        }
    }
}

/// Results of a single combination, in declared order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationReport {
    /// Position of the combination in enumeration order
    pub index: usize,
    pub combination: Combination,
    pub results: Vec<RunResult>,
}

impl CombinationReport {
    pub fn failure(&self) -> Option<&CombinationFailure> {
        self.results.iter().find_map(|r| match r {
            RunResult::CombinationError(f) => Some(f),
            RunResult::Assertion(_) => None,
        })
    }

    pub fn assertions(&self) -> impl Iterator<Item = &AssertionResult> {
        self.results.iter().filter_map(RunResult::as_assertion)
    }
}

/// Whether assertion failures alone fail the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitPolicy {
    /// Only combination-level errors produce a non-zero exit
    #[default]
    CombinationErrors,
    /// Any failed or errored assertion also produces a non-zero exit
    AnyFailure,
}

/// Aggregate counts over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub combinations: usize,
    pub combination_errors: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

/// Aggregate outcome of a full matrix run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub combinations: Vec<CombinationReport>,
}

impl RunReport {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            combinations: self.combinations.len(),
            ..Summary::default()
        };
        for report in &self.combinations {
            if report.failure().is_some() {
                summary.combination_errors += 1;
            }
            for result in report.assertions() {
                match result.outcome {
                    Outcome::Pass => summary.passed += 1,
                    Outcome::Fail { .. } => summary.failed += 1,
                    Outcome::Error { .. } => summary.errored += 1,
                }
            }
        }
        summary
    }

    pub fn results(&self) -> impl Iterator<Item = &RunResult> {
        self.combinations.iter().flat_map(|c| c.results.iter())
    }

    pub fn exit_code(&self, policy: ExitPolicy) -> i32 {
        let summary = self.summary();
        if summary.combination_errors > 0 {
            EXIT_COMBINATION_FAILED
        } else if policy == ExitPolicy::AnyFailure && summary.failed + summary.errored > 0 {
            EXIT_ASSERTION_FAILED
        } else {
            EXIT_SUCCESS
        }
    }
}

#[cfg(test)]
#[path = "report_test.rs"]
mod report_test;
