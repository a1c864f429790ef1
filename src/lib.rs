//! # webmatrix
//!
//! Cross-browser, cross-viewport visual and style regression checks over WebDriver.
//!
//! For every (browser, viewport) combination webmatrix opens a browser, loads
//! the target page, dismisses a cookie consent overlay if one shows up, then
//! walks the configured test cases: it locates each element, stores a
//! baseline screenshot once per test identity, and evaluates the test case's
//! assertions (visibility, class membership, computed CSS values, and
//! property-by-property diffs against named baseline style records).
//!
//! ## CLI Usage
//!
//! ```bash
//! # Run the matrix described by ./browsers.json, ./screensize.json,
//! # ./testdata.json and ./base.json
//! webmatrix run
//!
//! # Pick a config directory, a viewport group and four parallel workers
//! webmatrix run --config-dir qa --group desktop --workers 4
//!
//! # Fail the process on any assertion failure, not only on broken combinations
//! webmatrix run --fail-on-assertion --format json
//!
//! # Check the configuration without opening a browser
//! webmatrix validate --config-dir qa
//! ```
//!
//! Logs land in `logs/{browser}/{width}x{height}.log`, screenshots in
//! `screenshots/{browser}/{group}/{width}x{height}-{test}.png`. A screenshot
//! that already exists is never retaken.
//!
//! ## Library Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use webmatrix::{ConfigPaths, MatrixConfig, MatrixRunner, RunSettings, WebDriverProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = MatrixConfig::load(&ConfigPaths::in_dir("."))?;
//! let runner = MatrixRunner::new(
//!     Arc::new(config),
//!     WebDriverProvider::new(true, None),
//!     RunSettings::default(),
//! )?;
//! let report = Arc::new(runner).run().await;
//! println!("{:?}", report.summary());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

/// Assertion evaluation against resolved elements
pub mod assertion;

/// Configuration loading and validation
pub mod config;

/// Cookie consent dismissal
pub mod consent;

/// Per-combination context shared by the components
pub mod context;

/// Error taxonomy and exit codes
pub mod errors;

/// Test case execution
pub mod executor;

/// Run results and aggregate report
pub mod report;

/// Per-combination log files
pub mod reporter;

/// Element resolution with retry
pub mod resolver;

/// Browser × viewport matrix orchestration
pub mod runner;

/// Idempotent screenshot capture
pub mod screenshot;

/// Browser session boundary
pub mod session;

/// Configuration data model
pub mod types;

/// WebDriver-backed sessions
pub mod webdriver;

/// Automatic WebDriver process management
pub mod webdriver_manager;

pub use assertion::AssertionEngine;
pub use config::{ConfigPaths, MatrixConfig};
pub use consent::ConsentHandler;
pub use errors::CheckError;
pub use executor::TestCaseExecutor;
pub use report::{
    AssertionResult, Combination, CombinationReport, ExitPolicy, Outcome, RunReport, RunResult,
    Summary,
};
pub use resolver::ElementResolver;
pub use runner::{MatrixRunner, RunSettings};
pub use screenshot::{ScreenshotCache, ScreenshotKey, ScrollPadding};
pub use session::{PageElement, Session, SessionProvider};
pub use types::{
    Assertion, AssertionKind, BaselineRecords, BrowserProfile, Check, Locator, LocatorStrategy,
    NestedLocator, OutputFormat, TestCase, Viewport,
};
pub use webdriver::{BrowserType, WebDriverProvider};
