//! Browser × viewport matrix orchestration
//!
//! Every combination gets its own session, log file and screenshot subtree,
//! and runs as an independent task on a bounded worker pool. Whatever goes
//! wrong inside a combination (provisioning, navigation, an element that
//! never appears, a full disk, a timeout, even a panic) is recorded as a
//! `combinationError` result for that combination alone. The session is
//! closed on every one of those paths before the task ends.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MatrixConfig;
use crate::consent::ConsentHandler;
use crate::context::CombinationContext;
use crate::errors::{CheckError, CheckResult};
use crate::executor::TestCaseExecutor;
use crate::report::{Combination, CombinationFailure, CombinationReport, RunReport, RunResult};
use crate::reporter::CombinationLog;
use crate::resolver::{ElementResolver, RETRY_BACKOFF_MS};
use crate::screenshot::{ScreenshotCache, ScrollPadding};
use crate::session::{Session, SessionProvider};
use crate::types::BrowserProfile;

/// Upper bound on a session close, so a wedged driver cannot stall the pool
const CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Knobs for one run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub log_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    /// Combinations executed concurrently
    pub max_workers: usize,
    /// Deadline for one combination, provisioning included
    pub combination_timeout: Duration,
    pub padding: ScrollPadding,
    /// Pause after scrolling a test case's element into view
    pub settle: Duration,
    /// Retry pause window; must lie inside [`RETRY_BACKOFF_MS`]
    pub retry_backoff_ms: Range<u64>,
    /// `None` skips consent handling
    pub consent: Option<ConsentHandler>,
    /// Viewport groups to run; empty means the groups named by the test data
    pub groups: Vec<String>,
    /// Browser names to run; empty means every configured browser
    pub browsers: Vec<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            screenshot_dir: PathBuf::from("screenshots"),
            max_workers: 1,
            combination_timeout: Duration::from_secs(600),
            padding: ScrollPadding::default(),
            settle: Duration::from_millis(1000),
            retry_backoff_ms: RETRY_BACKOFF_MS,
            consent: Some(ConsentHandler::default()),
            groups: Vec::new(),
            browsers: Vec::new(),
        }
    }
}

pub struct MatrixRunner<P: SessionProvider> {
    config: Arc<MatrixConfig>,
    provider: P,
    settings: RunSettings,
    executor: TestCaseExecutor,
    cancel: CancellationToken,
}

impl<P: SessionProvider> MatrixRunner<P> {
    /// Build a runner. Unknown groups or browser filters are configuration errors.
    pub fn new(config: Arc<MatrixConfig>, provider: P, settings: RunSettings) -> CheckResult<Self> {
        for group in &settings.groups {
            config.viewports(group)?;
        }
        for name in &settings.browsers {
            if !config.browsers.iter().any(|b| &b.name == name) {
                return Err(CheckError::Config(format!(
                    "browser '{}' is not in the browser list",
                    name
                )));
            }
        }

        let executor = TestCaseExecutor::new(
            ElementResolver::with_backoff(settings.retry_backoff_ms.clone())?,
            ScreenshotCache::new(settings.screenshot_dir.clone(), settings.padding),
            settings.settle,
        );

        Ok(Self {
            config,
            provider,
            settings,
            executor,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that cancels every combination of this runner
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn groups(&self) -> &[String] {
        if self.settings.groups.is_empty() {
            &self.config.selected_groups
        } else {
            &self.settings.groups
        }
    }

    /// Browser × group × viewport, in configuration order
    pub fn combinations(&self) -> Vec<Combination> {
        let mut combinations = Vec::new();
        let browsers = self.config.browsers.iter().filter(|b| {
            self.settings.browsers.is_empty() || self.settings.browsers.contains(&b.name)
        });
        for browser in browsers {
            for group in self.groups() {
                let Some(viewports) = self.config.viewport_groups.get(group) else {
                    continue;
                };
                for viewport in viewports {
                    combinations.push(Combination::new(&browser.name, group, *viewport));
                }
            }
        }
        combinations
    }

    /// Run a single combination to completion.
    ///
    /// Never fails: any error ends up as the last result, of kind
    /// `combinationError`, after whatever assertion results were produced
    /// before it.
    pub async fn run_combination(&self, combination: &Combination) -> Vec<RunResult> {
        let mut results = Vec::new();

        let log = match CombinationLog::open(&self.settings.log_dir, combination) {
            Ok(log) => log,
            Err(e) => {
                error!("Cannot open log for {}: {}", combination, e);
                results.push(failure(combination, e.to_string()));
                return results;
            }
        };

        let ctx = CombinationContext {
            combination,
            baselines: &self.config.baselines,
            log: &log,
            cancel: &self.cancel,
        };
        let deadline = Instant::now() + self.settings.combination_timeout;

        let outcome = AssertUnwindSafe(self.drive(&ctx, &mut results, deadline))
            .catch_unwind()
            .await;

        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
        };

        if let Some(error) = error {
            let result = failure(combination, error);
            if let Err(e) = log.record(&result) {
                warn!("Could not log failure for {}: {}", combination, e);
            }
            results.push(result);
        }

        results
    }

    async fn drive(
        &self,
        ctx: &CombinationContext<'_>,
        results: &mut Vec<RunResult>,
        deadline: Instant,
    ) -> CheckResult<()> {
        let combination = ctx.combination;
        ctx.log
            .info(format!("Running tests for browser: {}", combination.browser))?;
        ctx.log.info(format!("Screen size: {}", combination.viewport))?;

        let profile = BrowserProfile {
            name: combination.browser.clone(),
        };
        let session = self
            .bounded(
                ctx,
                deadline,
                self.provider.open(&profile, combination.viewport),
            )
            .await?;

        let outcome = AssertUnwindSafe(self.bounded(
            ctx,
            deadline,
            self.exercise(&session, ctx, results),
        ))
        .catch_unwind()
        .await;

        let closed = match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
            Ok(Ok(())) => ctx.log.info("Browser instance closed"),
            Ok(Err(e)) => ctx
                .log
                .warn(format!("Failed to close browser: {}", e))
                .and(Err(e)),
            Err(_) => {
                let message = format!("browser close timed out after {:?}", CLOSE_TIMEOUT);
                ctx.log
                    .warn(&message)
                    .and(Err(CheckError::Driver(message)))
            }
        };

        // An error from the test cases outranks one from the close
        match outcome {
            Ok(result) => result.and(closed),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn exercise(
        &self,
        session: &P::Session,
        ctx: &CombinationContext<'_>,
        results: &mut Vec<RunResult>,
    ) -> CheckResult<()> {
        session.set_viewport(ctx.combination.viewport).await?;
        session.navigate(&self.config.url).await?;
        ctx.log.info(format!("Opened URL: {}", self.config.url))?;

        if let Some(consent) = &self.settings.consent {
            consent.maybe_dismiss(session, ctx).await?;
        }

        for test_case in &self.config.test_cases {
            self.executor
                .execute(session, test_case, ctx, results)
                .await?;
        }
        Ok(())
    }

    /// Race a step against the combination deadline and run cancellation
    async fn bounded<T>(
        &self,
        ctx: &CombinationContext<'_>,
        deadline: Instant,
        step: impl Future<Output = CheckResult<T>>,
    ) -> CheckResult<T> {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(CheckError::Cancelled),
            outcome = tokio::time::timeout_at(deadline, step) => match outcome {
                Ok(result) => result,
                Err(_) => Err(CheckError::Timeout(self.settings.combination_timeout)),
            },
        }
    }
}

impl<P: SessionProvider> MatrixRunner<P> {
    /// Run every combination on the worker pool, yielding reports as they finish
    pub fn stream(self: Arc<Self>) -> mpsc::Receiver<CombinationReport> {
        let combinations = self.combinations();
        let (tx, rx) = mpsc::channel(combinations.len().max(1));
        let workers = Arc::new(Semaphore::new(self.settings.max_workers.max(1)));

        info!(
            "Running {} combination(s) with {} worker(s)",
            combinations.len(),
            self.settings.max_workers.max(1)
        );

        tokio::spawn(async move {
            let mut tasks = JoinSet::new();
            for (index, combination) in combinations.into_iter().enumerate() {
                let runner = Arc::clone(&self);
                let workers = Arc::clone(&workers);
                let tx = tx.clone();
                tasks.spawn(async move {
                    let Ok(_permit) = workers.acquire_owned().await else {
                        return;
                    };
                    debug!("Starting combination {}", combination);
                    let results = runner.run_combination(&combination).await;
                    let report = CombinationReport {
                        index,
                        combination,
                        results,
                    };
                    if tx.send(report).await.is_err() {
                        debug!("Report receiver dropped");
                    }
                });
            }
            drop(tx);

            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    error!("Combination task aborted: {}", e);
                }
            }
        });

        rx
    }

    /// Run the whole matrix and collect reports in enumeration order
    pub async fn run(self: Arc<Self>) -> RunReport {
        let mut rx = self.stream();
        let mut combinations = Vec::new();
        while let Some(report) = rx.recv().await {
            combinations.push(report);
        }
        combinations.sort_by_key(|r| r.index);
        RunReport { combinations }
    }
}

fn failure(combination: &Combination, error: String) -> RunResult {
    RunResult::CombinationError(CombinationFailure {
        combination: combination.clone(),
        error,
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

