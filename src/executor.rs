//! Runs one test case: primary element, its assertions, then nested locators

use std::time::Duration;

use crate::assertion::{AssertionEngine, Subject};
use crate::context::CombinationContext;
use crate::errors::{CheckError, CheckResult};
use crate::report::RunResult;
use crate::resolver::ElementResolver;
use crate::screenshot::{ScreenshotCache, ScreenshotKey, ScrollPadding, scroll_into_view};
use crate::session::{PageElement, Session};
use crate::types::{Assertion, TestCase};

pub struct TestCaseExecutor {
    resolver: ElementResolver,
    screenshots: ScreenshotCache,
    engine: AssertionEngine,
    /// Pause after scrolling so lazy content and transitions settle
    settle: Duration,
}

impl TestCaseExecutor {
    pub fn new(resolver: ElementResolver, screenshots: ScreenshotCache, settle: Duration) -> Self {
        Self {
            resolver,
            screenshots,
            engine: AssertionEngine::new(),
            settle,
        }
    }

    /// Execute a test case, appending results to `out` in declared order.
    ///
    /// Each result is logged as soon as it is produced. Assertion-scoped
    /// errors become errored results and execution continues; resolution,
    /// capture and storage errors abort the test case and are returned.
    pub async fn execute<S: Session>(
        &self,
        session: &S,
        test_case: &TestCase,
        ctx: &CombinationContext<'_>,
        out: &mut Vec<RunResult>,
    ) -> CheckResult<()> {
        ctx.log
            .info(format!("Executing test case: {}", test_case.name))?;

        let element = self
            .resolver
            .resolve(session, &test_case.locator, ctx)
            .await?;
        scroll_into_view(session, &element, ScrollPadding::default()).await?;
        self.pause(ctx).await?;

        let key = ScreenshotKey::new(ctx.combination, &test_case.name);
        self.screenshots
            .ensure_captured(session, &key, &element, ctx)
            .await?;

        let primary = Subject {
            test_case: &test_case.name,
            name: &test_case.name,
        };
        for assertion in &test_case.assertions {
            self.run_assertion(assertion, &element, primary, ctx, out)
                .await?;
        }

        for nested in &test_case.locators {
            ctx.log.info(format!(
                "Locating {} using {}",
                nested.name, nested.locator
            ))?;
            let element = self.resolver.resolve(session, &nested.locator, ctx).await?;
            let subject = Subject {
                test_case: &test_case.name,
                name: &nested.name,
            };
            for assertion in &nested.assertions {
                self.run_assertion(assertion, &element, subject, ctx, out)
                    .await?;
            }
        }

        Ok(())
    }

    async fn run_assertion<E: PageElement>(
        &self,
        assertion: &Assertion,
        element: &E,
        subject: Subject<'_>,
        ctx: &CombinationContext<'_>,
        out: &mut Vec<RunResult>,
    ) -> CheckResult<()> {
        let results = match self.engine.evaluate(assertion, element, subject, ctx).await {
            Ok(results) => results,
            Err(e) if e.is_assertion_scoped() => {
                vec![self.engine.errored(assertion, subject, ctx, &e)]
            }
            Err(e) => return Err(e),
        };

        for result in results {
            ctx.log.record(&result)?;
            out.push(result);
        }
        Ok(())
    }

    async fn pause(&self, ctx: &CombinationContext<'_>) -> CheckResult<()> {
        if self.settle.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(CheckError::Cancelled),
            _ = tokio::time::sleep(self.settle) => Ok(()),
        }
    }
}

