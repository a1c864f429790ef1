//! Element lookup with a single jittered retry

use rand::Rng;
use std::ops::Range;
use std::time::Duration;

use crate::context::CombinationContext;
use crate::errors::{CheckError, CheckResult};
use crate::session::Session;
use crate::types::Locator;

/// Backoff window before the second attempt, in milliseconds
pub const RETRY_BACKOFF_MS: Range<u64> = 3000..4000;

/// Total lookups per locator
pub const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct ElementResolver {
    backoff_ms: Range<u64>,
}

impl Default for ElementResolver {
    fn default() -> Self {
        Self {
            backoff_ms: RETRY_BACKOFF_MS,
        }
    }
}

impl ElementResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrow the backoff window. It must be non-empty and lie inside
    /// [`RETRY_BACKOFF_MS`].
    pub fn with_backoff(backoff_ms: Range<u64>) -> CheckResult<Self> {
        if backoff_ms.is_empty()
            || backoff_ms.start < RETRY_BACKOFF_MS.start
            || backoff_ms.end > RETRY_BACKOFF_MS.end
        {
            return Err(CheckError::Config(format!(
                "retry backoff {:?} ms must be a non-empty window inside {:?} ms",
                backoff_ms, RETRY_BACKOFF_MS
            )));
        }
        Ok(Self { backoff_ms })
    }

    /// Delay before the second attempt, uniform over the backoff window
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(rand::thread_rng().gen_range(self.backoff_ms.clone()))
    }

    /// Resolve a locator, retrying once after a jittered pause.
    ///
    /// The pause only suspends this combination's task and is cut short by
    /// cancellation. A second failure is always `NotFound`.
    pub async fn resolve<S: Session>(
        &self,
        session: &S,
        locator: &Locator,
        ctx: &CombinationContext<'_>,
    ) -> CheckResult<S::Element> {
        let first = match session.find_element(locator).await {
            Ok(element) => return Ok(element),
            Err(e) => e,
        };

        let delay = self.retry_delay();
        ctx.log.warn(format!(
            "Could not locate {} ({}). Retrying in {} ms",
            locator,
            first,
            delay.as_millis()
        ))?;

        tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(CheckError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        session
            .find_element(locator)
            .await
            .map_err(|e| CheckError::NotFound {
                locator: locator.to_string(),
                attempts: MAX_ATTEMPTS,
                cause: e.to_string(),
            })
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod resolver_test;
