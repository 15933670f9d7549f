//! Core types for the job state machine.

use std::fmt;

use serde::Serialize;

use super::exit::FailureKind;
use crate::aggregate::AggregateReport;
use crate::models::{JobKind, RenderStatus, Severity};
use crate::remote::ProcessExit;

/// One of the two independently advancing pipelines of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrackId {
    /// The render itself.
    Primary,
    /// Optional status probe while the render runs.
    Secondary,
}

impl TrackId {
    pub fn index(&self) -> usize {
        match self {
            TrackId::Primary => 0,
            TrackId::Secondary => 1,
        }
    }

    pub fn other(&self) -> TrackId {
        match self {
            TrackId::Primary => TrackId::Secondary,
            TrackId::Secondary => TrackId::Primary,
        }
    }
}

/// Pipeline stage, numbered for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Stage {
    SyncSupport = 1,
    SyncProject = 2,
    Dispatch = 3,
    Fetch = 4,
    Aggregate = 5,
}

impl Stage {
    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::SyncSupport => "Sync support files",
            Stage::SyncProject => "Sync project",
            Stage::Dispatch => "Dispatch render",
            Stage::Fetch => "Fetch results",
            Stage::Aggregate => "Aggregate results",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A fatal track failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub track: TrackId,
    pub stage: Stage,
    /// One-line report shown to the user.
    pub message: String,
}

/// State of one track.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum PipelineState {
    #[default]
    Idle,
    SyncingSupportFiles,
    SyncingProject,
    /// Dispatch requested; the dispatcher has not been started yet.
    Dispatching,
    /// Dispatcher running on the remote host.
    Rendering,
    Fetching,
    Aggregating,
    Done,
    Cancelled,
    Failed(Failure),
}

impl PipelineState {
    /// Stage the track is in, if it is active.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineState::SyncingSupportFiles => Some(Stage::SyncSupport),
            PipelineState::SyncingProject => Some(Stage::SyncProject),
            PipelineState::Dispatching | PipelineState::Rendering => Some(Stage::Dispatch),
            PipelineState::Fetching => Some(Stage::Fetch),
            PipelineState::Aggregating => Some(Stage::Aggregate),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stage().is_some()
    }

    /// State for a track that has just started `stage`.
    pub fn entering(stage: Stage) -> Self {
        match stage {
            Stage::SyncSupport => PipelineState::SyncingSupportFiles,
            Stage::SyncProject => PipelineState::SyncingProject,
            Stage::Dispatch => PipelineState::Dispatching,
            Stage::Fetch => PipelineState::Fetching,
            Stage::Aggregate => PipelineState::Aggregating,
        }
    }
}

/// Remote operation a track asks the host to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    SyncSupport,
    SyncProject,
    Dispatch,
    /// Fetch results, archiving the previous contents first when set.
    Fetch { archive: bool },
}

impl Operation {
    pub fn stage(&self) -> Stage {
        match self {
            Operation::SyncSupport => Stage::SyncSupport,
            Operation::SyncProject => Stage::SyncProject,
            Operation::Dispatch => Stage::Dispatch,
            Operation::Fetch { .. } => Stage::Fetch,
        }
    }
}

/// A user-facing progress or error line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Complete,
    Partial,
    Cancelled,
    Failed,
}

impl Outcome {
    /// Registry status for this outcome.
    pub fn status(&self) -> RenderStatus {
        match self {
            Outcome::Complete => RenderStatus::Complete,
            Outcome::Partial => RenderStatus::Partial,
            Outcome::Cancelled => RenderStatus::Cancelled,
            Outcome::Failed => RenderStatus::Error,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Outcome::Complete | Outcome::Cancelled => Severity::Info,
            Outcome::Partial => Severity::Warning,
            Outcome::Failed => Severity::Error,
        }
    }
}

/// Final result of a job with its summary line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub outcome: Outcome,
    pub summary: String,
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The process for the track's current stage was started.
    Started(TrackId),
    Exited { track: TrackId, exit: ProcessExit },
    SpawnFailed { track: TrackId, message: String },
    Aggregated { track: TrackId, report: AggregateReport },
    AggregateFailed { track: TrackId, message: String },
    CancelRequested,
    ProbeRequested,
}

/// Side effect requested by the state machine, executed by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Start { track: TrackId, operation: Operation },
    Kill(TrackId),
    Aggregate(TrackId),
    SetStatus(RenderStatus),
    MarkViewable(JobKind),
    /// Support files reached the remote host with the current pool.
    SupportSynced,
    Emit(Message),
    Finished(JobOutcome),
}

/// Commands a host sends to a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobCommand {
    Cancel,
    Probe,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_numbered_in_order() {
        assert_eq!(Stage::SyncSupport.index(), 1);
        assert_eq!(Stage::Aggregate.index(), 5);
        assert!(Stage::Dispatch < Stage::Fetch);
    }

    #[test]
    fn dispatch_states_share_a_stage() {
        assert_eq!(PipelineState::Dispatching.stage(), Some(Stage::Dispatch));
        assert_eq!(PipelineState::Rendering.stage(), Some(Stage::Dispatch));
        assert!(!PipelineState::Done.is_active());
        assert!(!PipelineState::Idle.is_active());
    }

    #[test]
    fn outcomes_map_to_statuses() {
        assert_eq!(Outcome::Partial.status(), RenderStatus::Partial);
        assert_eq!(Outcome::Failed.status(), RenderStatus::Error);
        assert_eq!(Outcome::Failed.severity(), Severity::Error);
    }
}
