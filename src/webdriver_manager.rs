use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::webdriver::BrowserType;

/// Manages WebDriver processes (geckodriver, chromedriver)
///
/// Chrome sessions share one chromedriver. geckodriver only serves one
/// session at a time, so every Firefox session gets its own process, which
/// is stopped when its lease is released.
pub struct WebDriverManager {
    processes: Mutex<Vec<WebDriverProcess>>,
    /// Serializes driver startup so concurrent combinations don't race for ports
    starting: tokio::sync::Mutex<()>,
}

struct WebDriverProcess {
    browser_type: BrowserType,
    child: Child,
    port: u16,
    url: String,
    /// Owned by a single session rather than shared
    dedicated: bool,
}

/// A WebDriver endpoint handed to one session. Dropping a dedicated lease
/// stops its driver.
pub struct DriverLease {
    url: String,
    dedicated: Option<(&'static WebDriverManager, u16)>,
}

impl DriverLease {
    /// Endpoint managed outside this process
    pub fn external(url: String) -> Self {
        Self {
            url,
            dedicated: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for DriverLease {
    fn drop(&mut self) {
        if let Some((manager, port)) = self.dedicated.take() {
            manager.release_port(port);
        }
    }
}

fn driver_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

impl Default for WebDriverManager {
    fn default() -> Self {
        Self {
            processes: Mutex::new(Vec::new()),
            starting: tokio::sync::Mutex::new(()),
        }
    }
}

impl WebDriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn processes(&self) -> std::sync::MutexGuard<'_, Vec<WebDriverProcess>> {
        self.processes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get a driver endpoint for one session
    pub async fn acquire(&'static self, browser_type: BrowserType) -> Result<DriverLease> {
        let _starting = self.starting.lock().await;

        if !browser_type.shares_driver() {
            let port = Self::find_free_port_for_browser(&browser_type)?;
            // Taken before startup so a dropped acquire still stops the process
            let lease = DriverLease {
                url: driver_url(port),
                dedicated: Some((self, port)),
            };
            self.start_driver(browser_type, port, true).await?;
            return Ok(lease);
        }

        let managed: Vec<String> = self
            .processes()
            .iter()
            .filter(|p| p.browser_type == browser_type && !p.dedicated)
            .map(|p| p.url.clone())
            .collect();
        for url in managed {
            if Self::verify_driver_working(&url).await {
                debug!("Using existing managed WebDriver at {}", url);
                return Ok(DriverLease::external(url));
            }
        }

        // A driver the user started on the standard port
        let standard = driver_url(browser_type.default_port());
        if Self::verify_driver_working(&standard).await {
            debug!("Found external WebDriver at {}", standard);
            return Ok(DriverLease::external(standard));
        }

        info!("WebDriver not detected, attempting to start automatically...");
        let port = Self::find_free_port_for_browser(&browser_type)?;
        let url = self.start_driver(browser_type, port, false).await?;
        Ok(DriverLease::external(url))
    }

    /// Stop and forget the driver started on `port`, if any
    fn release_port(&self, port: u16) {
        let process = {
            let mut processes = self.processes();
            processes
                .iter()
                .position(|p| p.port == port)
                .map(|index| processes.remove(index))
        };
        if let Some(mut process) = process {
            debug!("Stopping dedicated WebDriver on port {}", port);
            Self::stop_process(&mut process);
        }
    }

    async fn start_driver(
        &self,
        browser_type: BrowserType,
        port: u16,
        dedicated: bool,
    ) -> Result<String> {
        let command = browser_type.driver_command();
        let args = match browser_type {
            BrowserType::Firefox => vec!["--port".to_string(), port.to_string()],
            BrowserType::Chrome => vec![format!("--port={}", port)],
        };

        if !Self::command_exists(command) {
            anyhow::bail!(
                "{} not found in PATH. Please install it:\n\
                  macOS: brew install {}\n\
                  Linux: Download from official releases\n\
                  Or see: https://www.selenium.dev/documentation/webdriver/getting_started/install_drivers/",
                command,
                command
            );
        }

        info!("Starting {} on port {}", command, port);

        let mut cmd = Command::new(command);
        cmd.args(&args).stdout(Stdio::null()).stderr(Stdio::null());

        // New process group so the browser children go down with the driver
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {}", command))?;
        let url = driver_url(port);

        self.processes().push(WebDriverProcess {
            browser_type,
            child,
            port,
            url: url.clone(),
            dedicated,
        });

        // 3 seconds total
        for _ in 0..30 {
            if Self::is_driver_running(&url).await {
                info!("WebDriver started successfully on port {}", port);
                return Ok(url);
            }
            sleep(Duration::from_millis(100)).await;
        }

        self.release_port(port);
        anyhow::bail!("{} failed to start within timeout", command)
    }

    /// Check if a command exists in PATH
    pub fn command_exists(command: &str) -> bool {
        let finder = if cfg!(windows) { "where" } else { "which" };
        Command::new(finder)
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Find a free port, preferring the browser's conventional ones
    pub fn find_free_port_for_browser(browser_type: &BrowserType) -> Result<u16> {
        let base = browser_type.default_port();
        for port in base..base + 3 {
            if !Self::is_port_in_use(port) {
                debug!("Found free port {} for {:?}", port, browser_type);
                return Ok(port);
            }
        }

        // Fall back to letting OS assign a port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        drop(listener);
        Ok(port)
    }

    /// Check if a port is in use
    pub fn is_port_in_use(port: u16) -> bool {
        std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
    }

    /// Check if WebDriver is answering at the given URL
    pub async fn is_driver_running(url: &str) -> bool {
        let status_url = format!("{}/status", url);

        match reqwest::Client::new()
            .get(&status_url)
            .timeout(Duration::from_secs(1))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// A working driver reports `value.ready == true`
    async fn verify_driver_working(url: &str) -> bool {
        let status_url = format!("{}/status", url);

        match reqwest::Client::new()
            .get(&status_url)
            .timeout(Duration::from_secs(1))
            .send()
            .await
        {
            Ok(response) => response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("value")?.get("ready")?.as_bool())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn stop_process(process: &mut WebDriverProcess) {
        #[cfg(unix)]
        {
            let pgid = process.child.id();
            if let Err(e) = Command::new("kill")
                .args(["-TERM", &format!("-{}", pgid)])
                .output()
            {
                debug!("Failed to signal process group {}: {}", pgid, e);
            }
        }

        if let Err(e) = process.child.kill() {
            debug!("WebDriver on port {} already exited: {}", process.port, e);
        }
        let _ = process.child.wait();
    }

    /// Stop all managed WebDriver processes
    pub fn stop_all(&self) {
        let mut processes = self.processes();
        if !processes.is_empty() {
            warn!("Stopping {} WebDriver process(es)", processes.len());
        }
        for process in processes.iter_mut() {
            debug!("Stopping WebDriver on port {}", process.port);
            Self::stop_process(process);
        }
        processes.clear();
    }
}

impl Drop for WebDriverManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

// Global WebDriver manager instance
lazy_static::lazy_static! {
    pub static ref GLOBAL_WEBDRIVER_MANAGER: WebDriverManager = WebDriverManager::new();
}

#[cfg(test)]
#[path = "webdriver_manager_test.rs"]
mod webdriver_manager_test;
