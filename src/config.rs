//! Loading and validating the matrix configuration
//!
//! Four JSON documents drive a run: the browser list, the viewport groups,
//! the test data (target URL, selected groups, test cases) and the optional
//! baseline style records. They are parsed into raw shapes first and then
//! converted into the typed, immutable [`MatrixConfig`]. Anything the typed
//! model cannot represent is rejected here, never at call time.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::CheckError;
use crate::types::{
    Assertion, AssertionKind, BaselineRecords, BrowserProfile, Check, Locator, LocatorStrategy,
    NestedLocator, StyleBaseline, TestCase, Viewport,
};

/// File names inside the configuration directory
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub browsers: PathBuf,
    pub screen_sizes: PathBuf,
    pub test_data: PathBuf,
    pub baseline: PathBuf,
}

impl ConfigPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        ConfigPaths {
            browsers: dir.join("browsers.json"),
            screen_sizes: dir.join("screensize.json"),
            test_data: dir.join("testdata.json"),
            baseline: dir.join("base.json"),
        }
    }
}

/// Immutable configuration injected into the runner
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    pub url: String,
    pub browsers: Vec<BrowserProfile>,
    pub viewport_groups: BTreeMap<String, Vec<Viewport>>,
    /// Groups named by the test data, in declared order
    pub selected_groups: Vec<String>,
    pub test_cases: Vec<TestCase>,
    pub baselines: BaselineRecords,
}

impl MatrixConfig {
    /// Load every document from disk. A missing baseline file means no baselines.
    pub fn load(paths: &ConfigPaths) -> Result<Self> {
        let browsers: RawBrowsers = read_json(&paths.browsers)?;
        let screen_sizes: BTreeMap<String, Vec<Viewport>> = read_json(&paths.screen_sizes)?;
        let test_data: RawTestData = read_json(&paths.test_data)?;
        let baseline: RawBaseline = if paths.baseline.exists() {
            read_json(&paths.baseline)?
        } else {
            debug!("No baseline file at {}", paths.baseline.display());
            RawBaseline::new()
        };

        let config = Self::from_raw(browsers, screen_sizes, test_data, baseline)?;
        info!(
            "Loaded {} browser(s), {} viewport group(s), {} test case(s)",
            config.browsers.len(),
            config.viewport_groups.len(),
            config.test_cases.len()
        );
        Ok(config)
    }

    /// Build from JSON values already in memory
    pub fn from_json(
        browsers: Value,
        screen_sizes: Value,
        test_data: Value,
        baseline: Value,
    ) -> Result<Self> {
        Ok(Self::from_raw(
            serde_json::from_value(browsers).context("Invalid browser list")?,
            serde_json::from_value(screen_sizes).context("Invalid screen sizes")?,
            serde_json::from_value(test_data).context("Invalid test data")?,
            serde_json::from_value(baseline).context("Invalid baseline records")?,
        )?)
    }

    fn from_raw(
        browsers: RawBrowsers,
        screen_sizes: BTreeMap<String, Vec<Viewport>>,
        test_data: RawTestData,
        baseline: RawBaseline,
    ) -> Result<Self, CheckError> {
        if browsers.browser.is_empty() {
            return Err(CheckError::Config("browser list is empty".to_string()));
        }

        url::Url::parse(&test_data.url)
            .map_err(|e| CheckError::Config(format!("invalid url '{}': {}", test_data.url, e)))?;

        for (group, viewports) in &screen_sizes {
            if let Some(vp) = viewports.iter().find(|vp| vp.width == 0 || vp.height == 0) {
                return Err(CheckError::Config(format!(
                    "viewport {} in group '{}' has a zero dimension",
                    vp, group
                )));
            }
        }

        let selected_groups = test_data.screensizes.into_vec();
        for group in &selected_groups {
            if !screen_sizes.contains_key(group) {
                return Err(CheckError::Config(format!(
                    "screen size group '{}' is not defined",
                    group
                )));
            }
        }

        let test_cases = test_data
            .test_cases
            .into_iter()
            .map(RawTestCase::into_test_case)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MatrixConfig {
            url: test_data.url,
            browsers: browsers.browser,
            viewport_groups: screen_sizes,
            selected_groups,
            test_cases,
            baselines: baseline_records(baseline)?,
        })
    }

    /// Viewports of a group, or a configuration error if it is unknown
    pub fn viewports(&self, group: &str) -> Result<&[Viewport], CheckError> {
        self.viewport_groups
            .get(group)
            .map(Vec::as_slice)
            .ok_or_else(|| CheckError::Config(format!("screen size group '{}' is not defined", group)))
    }

    /// baselineDiff references that a group's records do not define, as
    /// (test case, assertion, class)
    pub fn missing_baselines(&self, group: &str) -> Vec<(String, String, String)> {
        let mut missing = Vec::new();
        for test_case in &self.test_cases {
            let assertions = test_case
                .assertions
                .iter()
                .chain(test_case.locators.iter().flat_map(|l| l.assertions.iter()));
            for assertion in assertions {
                if let Check::BaselineDiff { class } = &assertion.check
                    && self.baselines.lookup(group, class).is_none()
                {
                    missing.push((test_case.name.clone(), assertion.name.clone(), class.clone()));
                }
            }
        }
        missing
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[derive(Debug, Deserialize)]
struct RawBrowsers {
    browser: Vec<BrowserProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupSelection {
    One(String),
    Many(Vec<String>),
}

impl GroupSelection {
    fn into_vec(self) -> Vec<String> {
        match self {
            GroupSelection::One(group) => vec![group],
            GroupSelection::Many(groups) => groups,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTestData {
    url: String,
    screensizes: GroupSelection,
    #[serde(default)]
    test_cases: Vec<RawTestCase>,
}

#[derive(Debug, Deserialize)]
struct RawTestCase {
    test_name: String,
    #[serde(rename = "type")]
    strategy: LocatorStrategy,
    value: String,
    #[serde(default)]
    assertions: Vec<RawAssertion>,
    #[serde(default)]
    locators: Vec<RawLocator>,
}

impl RawTestCase {
    fn into_test_case(self) -> Result<TestCase, CheckError> {
        let name = self.test_name;
        let assertions = convert_assertions(&name, self.assertions)?;
        let locators = self
            .locators
            .into_iter()
            .map(|raw| {
                Ok(NestedLocator {
                    assertions: convert_assertions(&raw.locator_name, raw.assertions)?,
                    name: raw.locator_name,
                    locator: Locator::new(raw.strategy, raw.value),
                })
            })
            .collect::<Result<Vec<_>, CheckError>>()?;

        Ok(TestCase {
            name,
            locator: Locator::new(self.strategy, self.value),
            assertions,
            locators,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawLocator {
    locator_name: String,
    #[serde(rename = "type")]
    strategy: LocatorStrategy,
    value: String,
    #[serde(default)]
    assertions: Vec<RawAssertion>,
}

#[derive(Debug, Deserialize)]
struct RawAssertion {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: AssertionKind,
    expected_value: Value,
    property: Option<String>,
}

fn convert_assertions(owner: &str, raw: Vec<RawAssertion>) -> Result<Vec<Assertion>, CheckError> {
    raw.into_iter()
        .map(|raw| raw.into_assertion(owner))
        .collect()
}

impl RawAssertion {
    fn into_assertion(self, owner: &str) -> Result<Assertion, CheckError> {
        let kind = self.kind;
        let name = self.name.unwrap_or_else(|| kind.as_str().to_string());
        let reject = |reason: String| {
            CheckError::Config(format!("assertion '{}' on '{}': {}", name, owner, reason))
        };

        let check = match kind {
            AssertionKind::IsVisible => {
                let expected = match &self.expected_value {
                    Value::Bool(b) => *b,
                    Value::String(s) if s == "true" => true,
                    Value::String(s) if s == "false" => false,
                    other => return Err(reject(format!("expected a boolean, got {}", other))),
                };
                Check::IsVisible { expected }
            }
            AssertionKind::CheckClassName => Check::ClassName {
                expected: scalar(&self.expected_value).ok_or_else(|| {
                    reject("expected_value must be a string".to_string())
                })?,
            },
            AssertionKind::CheckCssProperty => Check::CssProperty {
                property: self
                    .property
                    .clone()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| reject("checkCSSProperty requires a property".to_string()))?,
                expected: scalar(&self.expected_value).ok_or_else(|| {
                    reject("expected_value must be a string".to_string())
                })?,
            },
            AssertionKind::BaselineDiff => Check::BaselineDiff {
                class: scalar(&self.expected_value).ok_or_else(|| {
                    reject("expected_value must name a baseline class".to_string())
                })?,
            },
        };

        Ok(Assertion { name, check })
    }
}

/// Strings, numbers and booleans compare as their text form
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

type RawBaseline = HashMap<String, Vec<serde_json::Map<String, Value>>>;

fn baseline_records(raw: RawBaseline) -> Result<BaselineRecords, CheckError> {
    let mut records = BaselineRecords::new();
    for (group, tables) in raw {
        for table in tables {
            let mut classes = HashMap::new();
            for (class, properties) in table {
                let Value::Object(properties) = properties else {
                    return Err(CheckError::Config(format!(
                        "baseline class '{}' in group '{}' must be an object",
                        class, group
                    )));
                };
                let properties = properties
                    .into_iter()
                    .map(|(property, value)| {
                        scalar(&value).map(|v| (property.clone(), v)).ok_or_else(|| {
                            CheckError::Config(format!(
                                "baseline value for '{}.{}' must be a scalar",
                                class, property
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                classes.insert(class, StyleBaseline { properties });
            }
            records.push_table(group.clone(), classes);
        }
    }
    Ok(records)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
