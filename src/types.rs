use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Output format for CLI results
#[derive(Clone, Copy, Debug, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON format for programmatic consumption
    Json,
    /// Human-readable simple format
    Simple,
}

/// Browser viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Viewport { width, height }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One browser target from `browsers.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserProfile {
    pub name: String,
}

/// How a locator value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocatorStrategy {
    Id,
    Css,
    #[serde(alias = "xPath")]
    Xpath,
    ClassName,
    Name,
    TagName,
    LinkText,
    PartialLinkText,
}

impl LocatorStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorStrategy::Id => "id",
            LocatorStrategy::Css => "css",
            LocatorStrategy::Xpath => "xpath",
            LocatorStrategy::ClassName => "className",
            LocatorStrategy::Name => "name",
            LocatorStrategy::TagName => "tagName",
            LocatorStrategy::LinkText => "linkText",
            LocatorStrategy::PartialLinkText => "partialLinkText",
        }
    }
}

/// A (strategy, value) pair identifying a page element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: LocatorStrategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: LocatorStrategy, value: impl Into<String>) -> Self {
        Locator {
            strategy,
            value: value.into(),
        }
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::Id, value)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy.as_str(), self.value)
    }
}

/// Assertion type tag as written in the test data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertionKind {
    #[serde(rename = "isVisible")]
    IsVisible,
    #[serde(rename = "checkClassName")]
    CheckClassName,
    #[serde(rename = "checkCSSProperty")]
    CheckCssProperty,
    #[serde(rename = "baselineDiff", alias = "checkBase")]
    BaselineDiff,
}

impl AssertionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionKind::IsVisible => "isVisible",
            AssertionKind::CheckClassName => "checkClassName",
            AssertionKind::CheckCssProperty => "checkCSSProperty",
            AssertionKind::BaselineDiff => "baselineDiff",
        }
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The check an assertion performs, with its expected value already typed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Check {
    IsVisible { expected: bool },
    ClassName { expected: String },
    CssProperty { property: String, expected: String },
    BaselineDiff { class: String },
}

impl Check {
    pub fn kind(&self) -> AssertionKind {
        match self {
            Check::IsVisible { .. } => AssertionKind::IsVisible,
            Check::ClassName { .. } => AssertionKind::CheckClassName,
            Check::CssProperty { .. } => AssertionKind::CheckCssProperty,
            Check::BaselineDiff { .. } => AssertionKind::BaselineDiff,
        }
    }
}

/// One named check run against a resolved element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub name: String,
    pub check: Check,
}

/// A secondary element scoped to a test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedLocator {
    pub name: String,
    pub locator: Locator,
    pub assertions: Vec<Assertion>,
}

/// One top-level page assertion unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub locator: Locator,
    pub assertions: Vec<Assertion>,
    pub locators: Vec<NestedLocator>,
}

/// Expected CSS values for one style class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleBaseline {
    /// Property name and expected computed value, in declared order
    pub properties: Vec<(String, String)>,
}

/// Baseline style records keyed by viewport group.
///
/// Each group holds an ordered list of class tables; a class lookup takes the
/// first table that defines it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineRecords {
    groups: HashMap<String, Vec<HashMap<String, StyleBaseline>>>,
}

impl BaselineRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a class table to a group
    pub fn push_table(&mut self, group: impl Into<String>, table: HashMap<String, StyleBaseline>) {
        self.groups.entry(group.into()).or_default().push(table);
    }

    pub fn lookup(&self, group: &str, class: &str) -> Option<&StyleBaseline> {
        self.groups
            .get(group)?
            .iter()
            .find_map(|table| table.get(class))
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
