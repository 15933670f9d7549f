//! Interpretation of external process exit codes.

use serde::Serialize;

use super::types::Stage;
use crate::remote::{ProcessExit, EXIT_NO_FILES_MATCHED, EXIT_PARTIAL_FAILURE, EXIT_TOOL_MISSING};

/// Why a track failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// Interpreter or transfer tool missing on the remote host.
    ToolingMissing,
    /// Any other nonzero exit; `None` when killed by a signal.
    Unidentified { code: Option<i32> },
    /// A local program could not be started.
    SpawnFailed,
    /// Fetched results could not be merged.
    Aggregation,
}

/// What a finished process means for its track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitClass {
    Success,
    /// Fetch matched no files. Not an error.
    NothingReady,
    /// Dispatcher finished but some frames failed remotely.
    PartialFailure { failed_frames: Option<u32> },
    Fatal(FailureKind),
}

impl ExitClass {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExitClass::Fatal(_))
    }
}

/// Classify a process exit at the given stage.
pub fn classify(stage: Stage, exit: &ProcessExit) -> ExitClass {
    match exit.code {
        Some(0) => ExitClass::Success,
        Some(EXIT_NO_FILES_MATCHED) if stage == Stage::Fetch => ExitClass::NothingReady,
        Some(EXIT_TOOL_MISSING) => ExitClass::Fatal(FailureKind::ToolingMissing),
        Some(EXIT_PARTIAL_FAILURE) if stage == Stage::Dispatch => ExitClass::PartialFailure {
            failed_frames: parse_failed_frames(&exit.stderr),
        },
        code => ExitClass::Fatal(FailureKind::Unidentified { code }),
    }
}

/// Failed frame count reported on the dispatcher's last stderr line.
///
/// Takes the first run of digits on the last non-empty line.
pub fn parse_failed_frames(stderr: &[String]) -> Option<u32> {
    let line = stderr.iter().rev().find(|l| !l.trim().is_empty())?;
    let digits: String = line
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
