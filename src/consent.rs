//! Best-effort dismissal of cookie consent overlays

use tracing::debug;

use crate::context::CombinationContext;
use crate::errors::CheckResult;
use crate::session::{PageElement, Session};
use crate::types::Locator;

/// Cookiebot dialog container
pub const DEFAULT_DIALOG_ID: &str = "CybotCookiebotDialog";
/// Cookiebot "allow all" button
pub const DEFAULT_ACCEPT_ID: &str = "CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll";

#[derive(Debug, Clone)]
pub struct ConsentHandler {
    dialog: Locator,
    accept: Locator,
}

impl Default for ConsentHandler {
    fn default() -> Self {
        Self::new(Locator::id(DEFAULT_DIALOG_ID), Locator::id(DEFAULT_ACCEPT_ID))
    }
}

impl ConsentHandler {
    pub fn new(dialog: Locator, accept: Locator) -> Self {
        Self { dialog, accept }
    }

    /// Click the accept control if the consent dialog is showing.
    ///
    /// A missing or hidden dialog is the normal case and returns `Ok(false)`.
    /// Failing to click a visible dialog is logged and also returns `Ok(false)`;
    /// only log storage failures propagate.
    pub async fn maybe_dismiss<S: Session>(
        &self,
        session: &S,
        ctx: &CombinationContext<'_>,
    ) -> CheckResult<bool> {
        let visible = match session.find_element(&self.dialog).await {
            Ok(dialog) => dialog.is_displayed().await.unwrap_or(false),
            Err(e) => {
                debug!("No consent dialog ({}): {}", self.dialog, e);
                false
            }
        };

        if !visible {
            return Ok(false);
        }

        ctx.log.info("Cookie popup detected. Accepting cookies.")?;
        let clicked = match session.find_element(&self.accept).await {
            Ok(button) => button.click().await,
            Err(e) => Err(e),
        };

        match clicked {
            Ok(()) => {
                ctx.log.info("Accepted cookie popup")?;
                Ok(true)
            }
            Err(e) => {
                ctx.log
                    .warn(format!("Could not accept cookie popup ({}): {}", self.accept, e))?;
                Ok(false)
            }
        }
    }
}
