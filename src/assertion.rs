//! Evaluation of assertions against resolved elements

use crate::context::CombinationContext;
use crate::errors::{CheckError, CheckResult};
use crate::report::{AssertionResult, Outcome, RunResult};
use crate::session::PageElement;
use crate::types::{Assertion, Check};

/// Which element an assertion is being run for
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub test_case: &'a str,
    /// Test case name for primary assertions, locator name for nested ones
    pub name: &'a str,
}

/// Computed-style name for a property key; camelCase keys become kebab-case.
///
/// `fontSize` -> `font-size`, `WebkitTransform` -> `-webkit-transform`.
/// Kebab-case keys and custom properties pass through unchanged.
pub fn css_property_name(key: &str) -> String {
    if key.starts_with("--") {
        return key.to_string();
    }
    let mut name = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            name.push('-');
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
    }
    name
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionEngine;

impl AssertionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one assertion.
    ///
    /// Single-value checks yield one result. baselineDiff yields one result per
    /// property of the referenced record, every property evaluated even after a
    /// mismatch; an unreadable property becomes an errored result for that
    /// property alone. `Err` is returned only for assertion-scoped failures
    /// (unreadable attribute, missing baseline record).
    pub async fn evaluate<E: PageElement>(
        &self,
        assertion: &Assertion,
        element: &E,
        subject: Subject<'_>,
        ctx: &CombinationContext<'_>,
    ) -> CheckResult<Vec<RunResult>> {
        let single = |property: Option<String>, outcome: Outcome| {
            vec![RunResult::Assertion(result(
                assertion, subject, ctx, property, outcome,
            ))]
        };

        match &assertion.check {
            Check::IsVisible { expected } => {
                let displayed = element
                    .is_displayed()
                    .await
                    .map_err(|e| CheckError::attribute("visibility", e))?;
                Ok(single(None, compare(expected.to_string(), displayed.to_string())))
            }
            Check::ClassName { expected } => {
                let class = element
                    .attribute("class")
                    .await
                    .map_err(|e| CheckError::attribute("class attribute", e))?
                    .unwrap_or_default();
                let outcome = if class.contains(expected.as_str()) {
                    Outcome::Pass
                } else {
                    Outcome::Fail {
                        expected: expected.clone(),
                        actual: format!("className: {}", class),
                    }
                };
                Ok(single(None, outcome))
            }
            Check::CssProperty { property, expected } => {
                let actual = element
                    .css_value(&css_property_name(property))
                    .await
                    .map_err(|e| CheckError::attribute(format!("css property {}", property), e))?;
                Ok(single(
                    Some(property.clone()),
                    compare(expected.clone(), actual),
                ))
            }
            Check::BaselineDiff { class } => {
                let group = ctx.combination.group.as_str();
                let baseline = ctx.baselines.lookup(group, class).ok_or_else(|| {
                    CheckError::BaselineMissing {
                        group: group.to_string(),
                        class: class.clone(),
                    }
                })?;

                let mut results = Vec::with_capacity(baseline.properties.len());
                for (property, expected) in &baseline.properties {
                    let outcome = match element.css_value(&css_property_name(property)).await {
                        Ok(actual) => compare(expected.clone(), actual),
                        Err(e) => Outcome::Error {
                            message: CheckError::attribute(format!("css property {}", property), e)
                                .to_string(),
                        },
                    };
                    results.push(RunResult::Assertion(result(
                        assertion,
                        subject,
                        ctx,
                        Some(property.clone()),
                        outcome,
                    )));
                }
                Ok(results)
            }
        }
    }

    /// Result recording an assertion-scoped error
    pub fn errored(
        &self,
        assertion: &Assertion,
        subject: Subject<'_>,
        ctx: &CombinationContext<'_>,
        error: &CheckError,
    ) -> RunResult {
        let property = match &assertion.check {
            Check::CssProperty { property, .. } => Some(property.clone()),
            _ => None,
        };
        RunResult::Assertion(result(
            assertion,
            subject,
            ctx,
            property,
            Outcome::Error {
                message: error.to_string(),
            },
        ))
    }
}

fn compare(expected: String, actual: String) -> Outcome {
    if expected == actual {
        Outcome::Pass
    } else {
        Outcome::Fail { expected, actual }
    }
}

fn result(
    assertion: &Assertion,
    subject: Subject<'_>,
    ctx: &CombinationContext<'_>,
    property: Option<String>,
    outcome: Outcome,
) -> AssertionResult {
    AssertionResult {
        combination: ctx.combination.clone(),
        test_case: subject.test_case.to_string(),
        subject: subject.name.to_string(),
        assertion: assertion.name.clone(),
        kind: assertion.check.kind(),
        property,
        outcome,
    }
}

#[cfg(test)]
#[path = "assertion_test.rs"]
mod assertion_test;
