// Scripted in-memory browser used by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use webmatrix::context::CombinationContext;
use webmatrix::errors::{CheckError, CheckResult};
use webmatrix::reporter::CombinationLog;
use webmatrix::{
    BaselineRecords, BrowserProfile, Combination, Locator, PageElement, Session, SessionProvider,
    Viewport,
};

/// One element on the fake page
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub displayed: bool,
    pub class: Option<String>,
    pub css: HashMap<String, String>,
    /// CSS properties whose read fails
    pub unreadable: HashSet<String>,
    /// Every read fails, as if the element went stale
    pub stale: bool,
    /// Lookups that fail before the element shows up
    pub missing_for: u32,
}

impl FakeElement {
    pub fn visible() -> Self {
        Self {
            displayed: true,
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn with_css(mut self, property: &str, value: &str) -> Self {
        self.css.insert(property.to_string(), value.to_string());
        self
    }

    pub fn unreadable(mut self, property: &str) -> Self {
        self.unreadable.insert(property.to_string());
        self
    }

    pub fn late(mut self, missing_for: u32) -> Self {
        self.missing_for = missing_for;
        self
    }
}

/// What a browser does when asked to open or navigate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Behavior {
    #[default]
    Normal,
    FailOpen,
    FailNavigate,
    HangNavigate,
    PanicNavigate,
    FailClose,
}

/// Counters shared by every session of a provider
#[derive(Debug, Default)]
pub struct Stats {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub captures: AtomicUsize,
    pub clicks: Mutex<Vec<String>>,
    pub lookups: Mutex<HashMap<String, u32>>,
    pub navigations: Mutex<Vec<(String, Viewport)>>,
    /// Arguments of every script run, in order
    pub scripts: Mutex<Vec<Vec<Value>>>,
}

impl Stats {
    pub fn lookups_for(&self, locator: &Locator) -> u32 {
        self.lookups
            .lock()
            .unwrap()
            .get(&locator.to_string())
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    elements: HashMap<String, FakeElement>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: Locator, element: FakeElement) -> Self {
        self.elements.insert(locator.to_string(), element);
        self
    }
}

#[derive(Clone, Default)]
pub struct FakeProvider {
    page: Arc<FakePage>,
    behaviors: HashMap<String, Behavior>,
    pub stats: Arc<Stats>,
}

impl FakeProvider {
    pub fn new(page: FakePage) -> Self {
        Self {
            page: Arc::new(page),
            behaviors: HashMap::new(),
            stats: Arc::new(Stats::default()),
        }
    }

    pub fn behave(mut self, browser: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(browser.to_string(), behavior);
        self
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    type Session = FakeSession;

    async fn open(&self, browser: &BrowserProfile, viewport: Viewport) -> CheckResult<FakeSession> {
        let behavior = self
            .behaviors
            .get(&browser.name)
            .copied()
            .unwrap_or_default();
        if behavior == Behavior::FailOpen {
            return Err(CheckError::Provisioning {
                browser: browser.name.clone(),
                message: "driver not installed".to_string(),
            });
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            page: Arc::clone(&self.page),
            stats: Arc::clone(&self.stats),
            behavior,
            viewport: Mutex::new(viewport),
            browser: browser.name.clone(),
        })
    }
}

pub struct FakeSession {
    page: Arc<FakePage>,
    stats: Arc<Stats>,
    behavior: Behavior,
    viewport: Mutex<Viewport>,
    browser: String,
}

#[async_trait]
impl Session for FakeSession {
    type Element = FakeHandle;

    async fn navigate(&self, url: &str) -> CheckResult<()> {
        match self.behavior {
            Behavior::FailNavigate => {
                return Err(CheckError::Provisioning {
                    browser: self.browser.clone(),
                    message: format!("navigation to {} failed", url),
                });
            }
            Behavior::HangNavigate => std::future::pending::<()>().await,
            Behavior::PanicNavigate => panic!("renderer crashed"),
            _ => {}
        }
        let viewport = *self.viewport.lock().unwrap();
        self.stats
            .navigations
            .lock()
            .unwrap()
            .push((url.to_string(), viewport));
        Ok(())
    }

    async fn set_viewport(&self, viewport: Viewport) -> CheckResult<()> {
        *self.viewport.lock().unwrap() = viewport;
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> CheckResult<FakeHandle> {
        let key = locator.to_string();
        let attempt = {
            let mut lookups = self.stats.lookups.lock().unwrap();
            let count = lookups.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };

        match self.page.elements.get(&key) {
            Some(element) if attempt > element.missing_for => Ok(FakeHandle {
                key,
                element: element.clone(),
                stats: Arc::clone(&self.stats),
            }),
            _ => Err(CheckError::NotFound {
                locator: key,
                attempts: 1,
                cause: "no such element".to_string(),
            }),
        }
    }

    async fn execute_script(&self, _script: &str, args: Vec<Value>) -> CheckResult<Value> {
        self.stats.scripts.lock().unwrap().push(args);
        Ok(Value::Bool(true))
    }

    async fn capture_screenshot(&self) -> CheckResult<Vec<u8>> {
        self.stats.captures.fetch_add(1, Ordering::SeqCst);
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn close(&self) -> CheckResult<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::FailClose {
            return Err(CheckError::Driver("session already gone".to_string()));
        }
        Ok(())
    }
}

pub struct FakeHandle {
    key: String,
    element: FakeElement,
    stats: Arc<Stats>,
}

impl FakeHandle {
    fn check_stale(&self, what: &str) -> CheckResult<()> {
        if self.element.stale {
            return Err(CheckError::Driver(format!(
                "stale element reference while reading {}",
                what
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PageElement for FakeHandle {
    async fn is_displayed(&self) -> CheckResult<bool> {
        self.check_stale("displayed")?;
        Ok(self.element.displayed)
    }

    async fn attribute(&self, name: &str) -> CheckResult<Option<String>> {
        self.check_stale(name)?;
        Ok(match name {
            "class" => self.element.class.clone(),
            _ => None,
        })
    }

    async fn css_value(&self, property: &str) -> CheckResult<String> {
        self.check_stale(property)?;
        if self.element.unreadable.contains(property) {
            return Err(CheckError::Driver(format!("cannot read {}", property)));
        }
        Ok(self.element.css.get(property).cloned().unwrap_or_default())
    }

    async fn click(&self) -> CheckResult<()> {
        self.stats.clicks.lock().unwrap().push(self.key.clone());
        Ok(())
    }

    fn script_arg(&self) -> CheckResult<Value> {
        Ok(json!({ "fake-element": self.key }))
    }
}

/// Log, baselines and cancellation for driving one component directly
pub struct Harness {
    pub dir: TempDir,
    pub combination: Combination,
    pub baselines: BaselineRecords,
    pub log: CombinationLog,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_baselines(BaselineRecords::new())
    }

    pub fn with_baselines(baselines: BaselineRecords) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let combination = Combination::new("chrome", "desktop", Viewport::new(1280, 800));
        let log = CombinationLog::open(&dir.path().join("logs"), &combination)
            .expect("Failed to open log");
        Self {
            dir,
            combination,
            baselines,
            log,
            cancel: CancellationToken::new(),
        }
    }

    pub fn ctx(&self) -> CombinationContext<'_> {
        CombinationContext {
            combination: &self.combination,
            baselines: &self.baselines,
            log: &self.log,
            cancel: &self.cancel,
        }
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.dir.path().join("screenshots")
    }

    pub fn log_contents(&self) -> String {
        std::fs::read_to_string(self.log.path()).unwrap_or_default()
    }

    pub async fn session(&self, page: FakePage) -> (FakeSession, Arc<Stats>) {
        let provider = FakeProvider::new(page);
        let stats = Arc::clone(&provider.stats);
        let session = provider
            .open(
                &BrowserProfile {
                    name: "chrome".to_string(),
                },
                self.combination.viewport,
            )
            .await
            .expect("fake session");
        (session, stats)
    }
}
