use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::errors::{CheckError, CheckResult};
use crate::session::{PageElement, Session, SessionProvider};
use crate::types::{BrowserProfile, Locator, LocatorStrategy, Viewport};
use crate::webdriver_manager::{DriverLease, GLOBAL_WEBDRIVER_MANAGER};

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserType {
    /// Mozilla Firefox
    Firefox,
    /// Google Chrome/Chromium
    Chrome,
}

impl std::str::FromStr for BrowserType {
    type Err = anyhow::Error;

    /// Parse browser type from string (case-insensitive)
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "firefox" => Ok(BrowserType::Firefox),
            "chrome" | "chromium" => Ok(BrowserType::Chrome),
            _ => anyhow::bail!("Unsupported browser: {}", s),
        }
    }
}

impl BrowserType {
    /// Driver binary that speaks WebDriver for this browser
    pub fn driver_command(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "geckodriver",
            BrowserType::Chrome => "chromedriver",
        }
    }

    /// Port the driver listens on when started by hand
    pub fn default_port(&self) -> u16 {
        match self {
            BrowserType::Firefox => 4444,
            BrowserType::Chrome => 9515,
        }
    }

    /// geckodriver serves a single session per process
    pub fn shares_driver(&self) -> bool {
        matches!(self, BrowserType::Chrome)
    }

    /// Session capabilities for this browser
    pub fn capabilities(
        &self,
        viewport: Viewport,
        headless: bool,
    ) -> serde_json::Map<String, Value> {
        let mut caps = serde_json::Map::new();

        match self {
            BrowserType::Firefox => {
                let mut args = Vec::new();
                if headless {
                    args.push("--headless".to_string());
                }
                args.push(format!("--width={}", viewport.width));
                args.push(format!("--height={}", viewport.height));

                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
            BrowserType::Chrome => {
                let mut args = vec!["--no-sandbox".to_string()];
                if headless {
                    // Chrome 112+ headless mode
                    args.push("--headless=new".to_string());
                    args.push("--disable-gpu".to_string());
                    args.push("--disable-dev-shm-usage".to_string());
                }
                args.push(format!(
                    "--window-size={},{}",
                    viewport.width, viewport.height
                ));

                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
            }
        }

        caps
    }
}

/// Opens fantoccini sessions, launching drivers as needed
#[derive(Debug, Clone)]
pub struct WebDriverProvider {
    headless: bool,
    /// Externally managed endpoint (e.g. a Selenium grid); skips driver management
    webdriver_url: Option<String>,
}

impl WebDriverProvider {
    pub fn new(headless: bool, webdriver_url: Option<String>) -> Self {
        Self {
            headless,
            webdriver_url,
        }
    }
}

#[async_trait]
impl SessionProvider for WebDriverProvider {
    type Session = WebDriverSession;

    async fn open(
        &self,
        browser: &BrowserProfile,
        viewport: Viewport,
    ) -> CheckResult<WebDriverSession> {
        let provisioning = |message: String| CheckError::Provisioning {
            browser: browser.name.clone(),
            message,
        };

        let browser_type: BrowserType = browser
            .name
            .parse()
            .map_err(|e: anyhow::Error| provisioning(e.to_string()))?;

        info!("Connecting to {:?} WebDriver", browser_type);

        let lease = match &self.webdriver_url {
            Some(url) => DriverLease::external(url.clone()),
            None => GLOBAL_WEBDRIVER_MANAGER
                .acquire(browser_type)
                .await
                .map_err(|e| provisioning(format!("{:#}", e)))?,
        };

        debug!("Connecting to WebDriver at {}", lease.url());

        let caps = browser_type.capabilities(viewport, self.headless);
        // Dropping the lease on any early return stops a dedicated driver
        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(lease.url())
            .await
            .map_err(|e| provisioning(format!("Failed to connect to WebDriver: {}", e)))?;

        Ok(WebDriverSession {
            client,
            browser: browser.name.clone(),
            lease: std::sync::Mutex::new(Some(lease)),
        })
    }
}

/// A fantoccini client bound to one combination
pub struct WebDriverSession {
    client: Client,
    browser: String,
    lease: std::sync::Mutex<Option<DriverLease>>,
}

fn driver_error(e: CmdError) -> CheckError {
    CheckError::Driver(e.to_string())
}

/// A miss is a lookup failure the resolver may retry; anything else is a driver fault
fn lookup_error(locator: &Locator, e: CmdError) -> CheckError {
    if e.is_miss() {
        CheckError::NotFound {
            locator: locator.to_string(),
            attempts: 1,
            cause: e.to_string(),
        }
    } else {
        driver_error(e)
    }
}

#[async_trait]
impl Session for WebDriverSession {
    type Element = WebDriverElement;

    async fn navigate(&self, url: &str) -> CheckResult<()> {
        info!("Navigating to {}", url);

        self.client
            .goto(url)
            .await
            .map_err(|e| CheckError::Provisioning {
                browser: self.browser.clone(),
                message: format!("navigation to {} failed: {}", url, e),
            })?;

        // Wait for the page to be ready, max 2 seconds
        let wait_script = "return document.readyState === 'complete';";
        for _ in 0..20 {
            match self.client.execute(wait_script, vec![]).await {
                Ok(val) if val.as_bool().unwrap_or(false) => break,
                _ => tokio::time::sleep(tokio::time::Duration::from_millis(100)).await,
            }
        }

        Ok(())
    }

    async fn set_viewport(&self, viewport: Viewport) -> CheckResult<()> {
        debug!("Setting window size to {}", viewport);
        self.client
            .set_window_size(viewport.width, viewport.height)
            .await
            .map_err(driver_error)
    }

    async fn find_element(&self, locator: &Locator) -> CheckResult<WebDriverElement> {
        let value = locator.value.as_str();
        let found = match locator.strategy {
            LocatorStrategy::Id => self.client.find(fantoccini::Locator::Id(value)).await,
            LocatorStrategy::Css => self.client.find(fantoccini::Locator::Css(value)).await,
            LocatorStrategy::Xpath => self.client.find(fantoccini::Locator::XPath(value)).await,
            LocatorStrategy::LinkText => {
                self.client.find(fantoccini::Locator::LinkText(value)).await
            }
            LocatorStrategy::ClassName => {
                let css = format!(".{}", value);
                self.client.find(fantoccini::Locator::Css(&css)).await
            }
            LocatorStrategy::Name => {
                let css = format!("[name=\"{}\"]", value.replace('"', "\\\""));
                self.client.find(fantoccini::Locator::Css(&css)).await
            }
            LocatorStrategy::TagName => self.client.find(fantoccini::Locator::Css(value)).await,
            LocatorStrategy::PartialLinkText => {
                let xpath = format!("//a[contains(normalize-space(.), {})]", xpath_literal(value));
                self.client.find(fantoccini::Locator::XPath(&xpath)).await
            }
        };

        found
            .map(|element| WebDriverElement {
                element,
                client: self.client.clone(),
            })
            .map_err(|e| lookup_error(locator, e))
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> CheckResult<Value> {
        self.client.execute(script, args).await.map_err(driver_error)
    }

    async fn capture_screenshot(&self) -> CheckResult<Vec<u8>> {
        self.client.screenshot().await.map_err(driver_error)
    }

    async fn close(&self) -> CheckResult<()> {
        let closed = self.client.clone().close().await.map_err(driver_error);
        // Stops a dedicated driver now rather than when the session is dropped
        drop(
            self.lease
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take(),
        );
        closed
    }
}

/// Quote a string as an XPath literal, handling embedded quotes
fn xpath_literal(value: &str) -> String {
    if !value.contains('"') {
        format!("\"{}\"", value)
    } else if !value.contains('\'') {
        format!("'{}'", value)
    } else {
        let parts: Vec<String> = value.split('"').map(|p| format!("\"{}\"", p)).collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}

/// Computed value of one CSS property, as the browser reports it
const COMPUTED_STYLE: &str =
    "return window.getComputedStyle(arguments[0]).getPropertyValue(arguments[1]);";

pub struct WebDriverElement {
    element: Element,
    client: Client,
}

#[async_trait]
impl PageElement for WebDriverElement {
    async fn is_displayed(&self) -> CheckResult<bool> {
        self.element.is_displayed().await.map_err(driver_error)
    }

    async fn attribute(&self, name: &str) -> CheckResult<Option<String>> {
        self.element.attr(name).await.map_err(driver_error)
    }

    async fn css_value(&self, property: &str) -> CheckResult<String> {
        let value = self
            .client
            .execute(COMPUTED_STYLE, vec![self.script_arg()?, json!(property)])
            .await
            .map_err(driver_error)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn click(&self) -> CheckResult<()> {
        self.element.click().await.map_err(driver_error)
    }

    fn script_arg(&self) -> CheckResult<Value> {
        serde_json::to_value(&self.element).map_err(|e| CheckError::Driver(e.to_string()))
    }
}

#[cfg(test)]
#[path = "webdriver_test.rs"]
mod webdriver_test;
