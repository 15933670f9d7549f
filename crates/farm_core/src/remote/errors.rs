//! Error types for remote operations.

use std::io;

use thiserror::Error;

/// Errors raised while starting a remote operation.
///
/// Failures of a running operation are reported through its exit code, not
/// through this type.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The local program could not be started.
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Local preparation (server file, scratch copy) failed.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The request cannot be turned into a command.
    #[error("Invalid remote request: {0}")]
    Invalid(String),
}

impl RemoteError {
    pub fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;
