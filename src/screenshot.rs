//! Idempotent screenshot capture keyed by test identity

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::context::CombinationContext;
use crate::errors::{CheckError, CheckResult};
use crate::report::Combination;
use crate::session::{PageElement, Session};
use crate::types::Viewport;

/// Identity of one screenshot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScreenshotKey {
    pub browser: String,
    pub group: String,
    pub test_case: String,
    pub viewport: Viewport,
}

impl ScreenshotKey {
    pub fn new(combination: &Combination, test_case: impl Into<String>) -> Self {
        ScreenshotKey {
            browser: combination.browser.clone(),
            group: combination.group.clone(),
            test_case: test_case.into(),
            viewport: combination.viewport,
        }
    }

    /// `{root}/{browser}/{group}/{width}x{height}-{test_case}.png`
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(path_segment(&self.browser))
            .join(path_segment(&self.group))
            .join(format!(
                "{}-{}.png",
                self.viewport,
                path_segment(&self.test_case)
            ))
    }
}

// Names come from config; keep them inside their directory
pub(crate) fn path_segment(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// Extra room kept above and below the element when scrolling it into view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollPadding {
    pub top: u32,
    pub bottom: u32,
}

const SCROLL_WITH_PADDING: &str = r#"
    const el = arguments[0];
    const top = arguments[1];
    const bottom = arguments[2];
    el.scrollIntoView({ block: "start", inline: "nearest" });
    if (top > 0) {
        window.scrollBy(0, -top);
    }
    if (bottom > 0) {
        const rect = el.getBoundingClientRect();
        const overflow = rect.bottom + bottom - window.innerHeight;
        if (overflow > 0 && rect.top - overflow >= top) {
            window.scrollBy(0, overflow);
        }
    }
    return true;
"#;

pub struct ScreenshotCache {
    root: PathBuf,
    padding: ScrollPadding,
}

impl ScreenshotCache {
    pub fn new(root: impl Into<PathBuf>, padding: ScrollPadding) -> Self {
        Self {
            root: root.into(),
            padding,
        }
    }

    pub fn path_for(&self, key: &ScreenshotKey) -> PathBuf {
        key.path(&self.root)
    }

    /// Capture the viewport for `key` unless its file already exists.
    ///
    /// Returns whether a new file was written. Capture and write failures
    /// propagate.
    pub async fn ensure_captured<S: Session>(
        &self,
        session: &S,
        key: &ScreenshotKey,
        element: &S::Element,
        ctx: &CombinationContext<'_>,
    ) -> CheckResult<bool> {
        let path = self.path_for(key);
        if path.exists() {
            debug!("Screenshot already present at {}", path.display());
            return Ok(false);
        }

        scroll_into_view(session, element, self.padding).await?;
        let png = session.capture_screenshot().await?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CheckError::storage(parent, e))?;
        }
        fs::write(&path, &png).map_err(|e| CheckError::storage(&path, e))?;

        ctx.log.info(format!(
            "Took screenshot for test case: {} ({})",
            key.test_case,
            path.display()
        ))?;
        Ok(true)
    }
}

/// Scroll an element to the top of the viewport, honoring padding
pub async fn scroll_into_view<S: Session>(
    session: &S,
    element: &S::Element,
    padding: ScrollPadding,
) -> CheckResult<()> {
    session
        .execute_script(
            SCROLL_WITH_PADDING,
            vec![element.script_arg()?, json!(padding.top), json!(padding.bottom)],
        )
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "screenshot_test.rs"]
mod screenshot_test;
