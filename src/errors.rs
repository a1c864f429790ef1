use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Process exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_CONFIG_ERROR: i32 = 1;
pub const EXIT_COMBINATION_FAILED: i32 = 2;
pub const EXIT_ASSERTION_FAILED: i32 = 3;

/// Errors raised while driving the browser matrix
#[derive(Debug, Error)]
pub enum CheckError {
    /// Session could not be created or navigated
    #[error("failed to provision {browser} session: {message}")]
    Provisioning { browser: String, message: String },

    /// Element lookup exhausted every attempt
    #[error("no element found for {locator} after {attempts} attempt(s): {cause}")]
    NotFound {
        locator: String,
        attempts: u32,
        cause: String,
    },

    /// A property or attribute could not be read from a resolved element
    #[error("could not read {what} from element: {message}")]
    AttributeUnavailable { what: String, message: String },

    /// A baselineDiff assertion references a class with no baseline record
    #[error("no baseline record for class '{class}' in group '{group}'")]
    BaselineMissing { group: String, class: String },

    /// Screenshot write or log append failed
    #[error("storage error at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other WebDriver command failure
    #[error("webdriver command failed: {0}")]
    Driver(String),

    /// Per-combination deadline expired
    #[error("combination timed out after {0:?}")]
    Timeout(Duration),

    /// The run was cancelled
    #[error("run cancelled")]
    Cancelled,

    /// Configuration rejected at load time
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CheckError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CheckError::Storage {
            path: path.into(),
            source,
        }
    }

    pub fn attribute(what: impl Into<String>, message: impl ToString) -> Self {
        CheckError::AttributeUnavailable {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// Errors that only invalidate the assertion being evaluated.
    /// Everything else aborts the enclosing combination.
    pub fn is_assertion_scoped(&self) -> bool {
        matches!(
            self,
            CheckError::AttributeUnavailable { .. } | CheckError::BaselineMissing { .. }
        )
    }

    /// Get the exit code for this error when it escapes to the process
    pub fn exit_code(&self) -> i32 {
        match self {
            CheckError::Config(_) => EXIT_CONFIG_ERROR,
            CheckError::AttributeUnavailable { .. } | CheckError::BaselineMissing { .. } => {
                EXIT_ASSERTION_FAILED
            }
            _ => EXIT_COMBINATION_FAILED,
        }
    }
}

pub type CheckResult<T> = std::result::Result<T, CheckError>;
