//! Error types for job submission.
//!
//! Failures after a job has started are not errors: they end the job with
//! an `ERROR` status and a summary line instead.

use std::io;

use thiserror::Error;

use crate::frames::{FrameRangeError, MAX_EXPANDED_CHARS};
use crate::models::Severity;
use crate::validation::ValidationResult;

/// Reasons a job was not started.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// A job of either kind is still running.
    #[error("Render in progress...")]
    Busy,

    /// The active server group has no hosts.
    #[error("No servers available.")]
    NoServers,

    /// Required connection settings are missing.
    #[error("{0}")]
    NotConfigured(String),

    /// A pre-submission check failed.
    #[error("{}", .0.message)]
    Invalid(ValidationResult),

    /// The frame range text could not be parsed.
    #[error("Invalid frame ranges given.")]
    InvalidRange(#[source] FrameRangeError),

    /// The frame list is too long to hand to the dispatcher.
    #[error(
        "Frame range too large (maximum character count after conversion to ints list: {})",
        MAX_EXPANDED_CHARS
    )]
    RangeTooLarge(#[source] FrameRangeError),

    /// Local setup (job log) failed.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl SubmitError {
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured(message.into())
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Severity to report the rejection with.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Busy | Self::NoServers => Severity::Warning,
            Self::Invalid(result) => result.severity,
            Self::NotConfigured(_) | Self::InvalidRange(_) | Self::RangeTooLarge(_) | Self::Io { .. } => {
                Severity::Error
            }
        }
    }
}

/// Result type for job submission.
pub type SubmitResult<T> = Result<T, SubmitError>;
