//! Browser session boundary consumed by the matrix
//!
//! The core only talks to a browser through these traits. [`crate::webdriver`]
//! implements them over fantoccini; tests script them in memory.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::CheckResult;
use crate::types::{BrowserProfile, Locator, Viewport};

/// A live reference to an element inside one session
#[async_trait]
pub trait PageElement: Send + Sync {
    async fn is_displayed(&self) -> CheckResult<bool>;

    /// Read an attribute; `Ok(None)` when the element has no such attribute
    async fn attribute(&self, name: &str) -> CheckResult<Option<String>>;

    /// Read a computed CSS property (kebab-case name)
    async fn css_value(&self, property: &str) -> CheckResult<String>;

    async fn click(&self) -> CheckResult<()>;

    /// Encode the element so it can be passed as a script argument
    fn script_arg(&self) -> CheckResult<Value>;
}

/// One open browser instance
#[async_trait]
pub trait Session: Send + Sync {
    type Element: PageElement;

    async fn navigate(&self, url: &str) -> CheckResult<()>;

    async fn set_viewport(&self, viewport: Viewport) -> CheckResult<()>;

    /// Look up a single element. Absence is `CheckError::NotFound`.
    async fn find_element(&self, locator: &Locator) -> CheckResult<Self::Element>;

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> CheckResult<Value>;

    /// PNG bytes of the current viewport
    async fn capture_screenshot(&self) -> CheckResult<Vec<u8>>;

    /// Release the browser. Every element handle is invalid afterwards.
    async fn close(&self) -> CheckResult<()>;
}

/// Hands out ready sessions for a browser profile
#[async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    type Session: Session + 'static;

    async fn open(&self, browser: &BrowserProfile, viewport: Viewport)
    -> CheckResult<Self::Session>;
}
