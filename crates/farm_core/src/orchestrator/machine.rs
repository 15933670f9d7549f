//! The job state machine.
//!
//! [`JobMachine`] is a pure transition function: it consumes [`Event`]s and
//! returns the [`Effect`]s the host must carry out. It never starts a
//! process, touches the filesystem or reads a clock, so every scenario can be
//! driven directly in tests.
//!
//! ```text
//! primary:   SyncSupport(1) -> SyncProject(2) -> Dispatch(3) -> Fetch(4) -> Aggregate(5)
//! secondary:                                     (probe) Fetch(4) -> Aggregate(5)
//! ```

use super::exit::{classify, ExitClass, FailureKind};
use super::types::{
    Effect, Event, Failure, JobOutcome, Message, Operation, Outcome, PipelineState, Stage,
    TrackId,
};
use crate::aggregate::AggregateReport;
use crate::models::{Job, JobKind, RenderStatus};
use crate::remote::ProcessExit;

/// Orchestrates one job's primary and secondary tracks.
#[derive(Debug, Clone)]
pub struct JobMachine {
    kind: JobKind,
    samples_per_job: u32,
    sync_support: bool,
    tracks: [PipelineState; 2],
    /// Whether the fetch running on each track archives old results first.
    fetch_archives: [bool; 2],
    /// Previous results have been moved aside for this job.
    archived: bool,
    /// A status probe has completed at least once.
    probed: bool,
    render_cancelled: bool,
    failed_frames: u32,
    outcome: Option<JobOutcome>,
}

impl JobMachine {
    /// Create a machine for `job`. Stage 1 runs only when `sync_support` is set.
    pub fn new(job: &Job, sync_support: bool) -> Self {
        Self {
            kind: job.kind,
            samples_per_job: job.samples_per_job,
            sync_support,
            tracks: [PipelineState::Idle, PipelineState::Idle],
            fetch_archives: [false; 2],
            archived: false,
            probed: false,
            render_cancelled: false,
            failed_frames: 0,
            outcome: None,
        }
    }

    pub fn state(&self, track: TrackId) -> &PipelineState {
        &self.tracks[track.index()]
    }

    pub fn outcome(&self) -> Option<&JobOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn render_cancelled(&self) -> bool {
        self.render_cancelled
    }

    /// Frames the dispatcher reported as failed.
    pub fn failed_frames(&self) -> u32 {
        self.failed_frames
    }

    /// Effects that start the primary track.
    pub fn start(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::SetStatus(RenderStatus::Preparing)];
        let first = if self.sync_support {
            Operation::SyncSupport
        } else {
            Operation::SyncProject
        };
        self.begin(TrackId::Primary, first, &mut effects);
        effects
    }

    /// Apply one event. Events after the job finished are ignored.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.is_finished() {
            return effects;
        }

        match event {
            Event::Started(track) => {
                let state = &mut self.tracks[track.index()];
                if *state == PipelineState::Dispatching {
                    *state = PipelineState::Rendering;
                }
            }
            Event::Exited { track, exit } => self.on_exit(track, exit, &mut effects),
            Event::SpawnFailed { track, message } => {
                if let Some(stage) = self.state(track).stage() {
                    let text = format!("Could not start {}: {}", stage.name().to_lowercase(), message);
                    self.fail(track, stage, FailureKind::SpawnFailed, text, &[], &mut effects);
                }
            }
            Event::Aggregated { track, report } => self.on_aggregated(track, report, &mut effects),
            Event::AggregateFailed { track, message } => {
                if *self.state(track) != PipelineState::Aggregating {
                    return effects;
                }
                match track {
                    TrackId::Primary => {
                        let text = format!("Could not merge results: {}", message);
                        self.fail(track, Stage::Aggregate, FailureKind::Aggregation, text, &[], &mut effects);
                    }
                    TrackId::Secondary => {
                        effects.push(Effect::Emit(Message::warning(format!(
                            "Status check failed: {}",
                            message
                        ))));
                        self.tracks[1] = PipelineState::Idle;
                    }
                }
            }
            Event::CancelRequested => self.on_cancel(&mut effects),
            Event::ProbeRequested => self.on_probe(&mut effects),
        }
        effects
    }

    fn on_exit(&mut self, track: TrackId, exit: ProcessExit, effects: &mut Vec<Effect>) {
        // Killed probes and other stale handles land here with no active stage
        let Some(stage) = self.state(track).stage() else {
            return;
        };
        if stage == Stage::Aggregate {
            return;
        }

        // The dispatch connection was dropped on purpose; go salvage results
        if track == TrackId::Primary && stage == Stage::Dispatch && self.render_cancelled {
            self.begin_primary_fetch(effects);
            return;
        }

        match classify(stage, &exit) {
            ExitClass::Success => self.advance(track, stage, effects),
            ExitClass::NothingReady => {
                self.note_fetch_done(track);
                if track == TrackId::Secondary && !self.probed {
                    effects.push(Effect::Emit(Message::warning(
                        "No render files found - try again in a moment",
                    )));
                    self.tracks[1] = PipelineState::Idle;
                } else {
                    self.aggregate(track, effects);
                }
            }
            ExitClass::PartialFailure { failed_frames } => {
                for line in exit.stderr.iter().filter(|l| !l.trim().is_empty()) {
                    effects.push(Effect::Emit(Message::warning(format!("dispatcher: {}", line))));
                }
                match failed_frames {
                    Some(n) => self.failed_frames = n,
                    None => {
                        tracing::warn!("Dispatcher exited with failures but no frame count");
                        effects.push(Effect::Emit(Message::warning(
                            "Could not read failed frame count from dispatcher output",
                        )));
                    }
                }
                self.advance(track, stage, effects);
            }
            ExitClass::Fatal(kind) => {
                let text = failure_message(track, stage, &kind, &exit);
                self.fail(track, stage, kind, text, &exit.stderr, effects);
            }
        }
    }

    fn advance(&mut self, track: TrackId, finished: Stage, effects: &mut Vec<Effect>) {
        match finished {
            Stage::SyncSupport => {
                effects.push(Effect::SupportSynced);
                self.begin(TrackId::Primary, Operation::SyncProject, effects);
            }
            Stage::SyncProject => {
                effects.push(Effect::SetStatus(RenderStatus::Rendering));
                self.begin(TrackId::Primary, Operation::Dispatch, effects);
            }
            Stage::Dispatch => self.begin_primary_fetch(effects),
            Stage::Fetch => {
                self.note_fetch_done(track);
                self.aggregate(track, effects);
            }
            Stage::Aggregate => {}
        }
    }

    fn begin(&mut self, track: TrackId, operation: Operation, effects: &mut Vec<Effect>) {
        let i = track.index();
        self.tracks[i] = PipelineState::entering(operation.stage());
        if let Operation::Fetch { archive } = operation {
            self.fetch_archives[i] = archive;
        }
        effects.push(Effect::Start { track, operation });
    }

    fn begin_primary_fetch(&mut self, effects: &mut Vec<Effect>) {
        self.stop_track(TrackId::Secondary, effects);
        if !self.render_cancelled {
            effects.push(Effect::SetStatus(RenderStatus::Finishing));
        }
        let archive = !self.archived;
        self.begin(TrackId::Primary, Operation::Fetch { archive }, effects);
    }

    fn note_fetch_done(&mut self, track: TrackId) {
        if self.fetch_archives[track.index()] {
            self.archived = true;
        }
    }

    fn aggregate(&mut self, track: TrackId, effects: &mut Vec<Effect>) {
        self.tracks[track.index()] = PipelineState::Aggregating;
        effects.push(Effect::Aggregate(track));
    }

    /// Kill a track's live process, if any, and mark it cancelled.
    fn stop_track(&mut self, track: TrackId, effects: &mut Vec<Effect>) {
        if self.state(track).is_active() {
            effects.push(Effect::Kill(track));
            self.tracks[track.index()] = PipelineState::Cancelled;
        }
    }

    fn on_aggregated(&mut self, track: TrackId, report: AggregateReport, effects: &mut Vec<Effect>) {
        if *self.state(track) != PipelineState::Aggregating {
            return;
        }
        match track {
            TrackId::Secondary => {
                self.probed = true;
                self.tracks[1] = PipelineState::Done;
                self.report_probe(&report, effects);
            }
            TrackId::Primary => {
                self.tracks[0] = PipelineState::Done;
                self.finish_primary(&report, effects);
            }
        }
    }

    fn report_probe(&self, report: &AggregateReport, effects: &mut Vec<Effect>) {
        match self.kind {
            JobKind::Image if report.total_samples > 0 => {
                effects.push(Effect::Emit(Message::info(format!(
                    "Render preview loaded ({} samples)",
                    report.total_samples * self.samples_per_job
                ))));
                effects.push(Effect::MarkViewable(JobKind::Image));
            }
            JobKind::Image => effects.push(Effect::Emit(Message::warning(
                "No render files found - try again in a moment",
            ))),
            JobKind::Animation => {
                effects.push(Effect::Emit(Message::info(format!(
                    "{}/{} frames completed so far",
                    report.completed, report.expected
                ))));
                if report.completed > 0 {
                    effects.push(Effect::MarkViewable(JobKind::Animation));
                }
            }
        }
    }

    fn finish_primary(&mut self, report: &AggregateReport, effects: &mut Vec<Effect>) {
        let failed = if self.failed_frames > 0 {
            format!(" ({} failed remotely)", self.failed_frames)
        } else {
            String::new()
        };

        let (outcome, summary) = match self.kind {
            JobKind::Image => {
                let samples = report.total_samples * self.samples_per_job;
                if report.total_samples > 0 {
                    effects.push(Effect::MarkViewable(JobKind::Image));
                }
                if self.render_cancelled && report.total_samples == 0 {
                    (Outcome::Cancelled, NOTHING_SALVAGED.to_string())
                } else if self.render_cancelled {
                    (Outcome::Cancelled, format!("Render cancelled at {} samples", samples))
                } else if report.total_samples == 0 {
                    (Outcome::Partial, "No render files found on host server".to_string())
                } else if self.failed_frames > 0 {
                    (Outcome::Partial, format!("Render completed at {} samples{}", samples, failed))
                } else {
                    (Outcome::Complete, format!("Render completed at {} samples", samples))
                }
            }
            JobKind::Animation => {
                if report.completed > 0 {
                    effects.push(Effect::MarkViewable(JobKind::Animation));
                }
                let counts = format!("{}/{} frames", report.completed, report.expected);
                if self.render_cancelled && report.completed == 0 {
                    (Outcome::Cancelled, NOTHING_SALVAGED.to_string())
                } else if self.render_cancelled {
                    (Outcome::Cancelled, format!("Render cancelled. Fetched {}", counts))
                } else if self.failed_frames > 0 || report.completed < report.expected {
                    (Outcome::Partial, format!("Render completed for {}{}", counts, failed))
                } else {
                    (Outcome::Complete, format!("Render completed for {}", counts))
                }
            }
        };
        self.finish(outcome, summary, effects);
    }

    fn on_cancel(&mut self, effects: &mut Vec<Effect>) {
        match self.state(TrackId::Primary).stage() {
            Some(Stage::SyncSupport | Stage::SyncProject) => {
                self.stop_track(TrackId::Primary, effects);
                self.stop_track(TrackId::Secondary, effects);
                self.finish(Outcome::Cancelled, "Render process cancelled".to_string(), effects);
            }
            Some(Stage::Dispatch) if !self.render_cancelled => {
                self.render_cancelled = true;
                effects.push(Effect::SetStatus(RenderStatus::Finishing));
                effects.push(Effect::Emit(Message::info(
                    "Render process cancelled. Fetching frames...",
                )));
                effects.push(Effect::Kill(TrackId::Primary));
            }
            Some(Stage::Fetch | Stage::Aggregate) if !self.render_cancelled => {
                self.render_cancelled = true;
                effects.push(Effect::Emit(Message::info("Render process cancelled")));
            }
            _ => {}
        }
    }

    fn on_probe(&mut self, effects: &mut Vec<Effect>) {
        match self.state(TrackId::Primary).stage() {
            Some(Stage::Dispatch) if !self.render_cancelled => {
                if self.state(TrackId::Secondary).is_active() {
                    return;
                }
                let text = match self.kind {
                    JobKind::Image => "Preparing render preview...",
                    JobKind::Animation => "Checking render status...",
                };
                effects.push(Effect::Emit(Message::info(text)));
                let archive = !self.archived;
                self.begin(TrackId::Secondary, Operation::Fetch { archive }, effects);
            }
            Some(Stage::SyncSupport | Stage::SyncProject) => effects.push(Effect::Emit(
                Message::warning("Files are still transferring - try again in a moment"),
            )),
            Some(_) => effects.push(Effect::Emit(Message::info("Render is already finishing"))),
            None => {}
        }
    }

    fn fail(
        &mut self,
        track: TrackId,
        stage: Stage,
        kind: FailureKind,
        message: String,
        stderr: &[String],
        effects: &mut Vec<Effect>,
    ) {
        for line in stderr.iter().filter(|l| !l.trim().is_empty()) {
            effects.push(Effect::Emit(Message::warning(line.clone())));
        }
        self.tracks[track.index()] = PipelineState::Failed(Failure {
            kind,
            track,
            stage,
            message: message.clone(),
        });
        self.stop_track(track.other(), effects);
        self.finish(Outcome::Failed, message, effects);
    }

    fn finish(&mut self, outcome: Outcome, summary: String, effects: &mut Vec<Effect>) {
        let result = JobOutcome { outcome, summary };
        effects.push(Effect::Finished(result.clone()));
        self.outcome = Some(result);
    }
}

const NOTHING_SALVAGED: &str = "Process cancelled - No output images found on host server";

fn failure_message(track: TrackId, stage: Stage, kind: &FailureKind, exit: &ProcessExit) -> String {
    match kind {
        FailureKind::ToolingMissing => "python and/or rsync not installed on host server".to_string(),
        FailureKind::Unidentified { code } => {
            let source = if stage == Stage::Dispatch {
                "dispatcher".to_string()
            } else {
                format!("Track {} at stage {}", track.index(), stage.index())
            };
            let detail = if exit.stderr.iter().any(|l| !l.trim().is_empty()) {
                "Error message available in the job log."
            } else {
                "No error message to print."
            };
            match code {
                Some(code) => format!("{} gave return code {}. {}", source, code, detail),
                None => format!("{} was terminated by a signal. {}", source, detail),
            }
        }
        FailureKind::SpawnFailed | FailureKind::Aggregation => format!("{} failed", stage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::FrameSet;
    use crate::models::Severity;
    use std::path::PathBuf;

    fn job(kind: JobKind) -> Job {
        Job {
            id: 1,
            kind,
            project: "shot".to_string(),
            project_file: PathBuf::from("/work/shot.blend"),
            frames: FrameSet::span(1, 4).unwrap(),
            output_prefix: "shot".to_string(),
            custom_prefix: false,
            extension: "png".to_string(),
            compress: false,
            samples_per_job: 10,
            jobs_per_frame: 20,
            max_server_load: 1,
            timeout_secs: 15,
            result_dir: PathBuf::from("/work/render-dump"),
        }
    }

    fn exited(track: TrackId, code: i32) -> Event {
        Event::Exited {
            track,
            exit: ProcessExit::with_code(code),
        }
    }

    fn exited_with(track: TrackId, code: i32, stderr: &[&str]) -> Event {
        Event::Exited {
            track,
            exit: ProcessExit {
                code: Some(code),
                stderr: stderr.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    fn report(completed: usize, expected: usize, total_samples: u32) -> AggregateReport {
        AggregateReport {
            new_samples: total_samples,
            total_samples,
            completed,
            expected,
            missing: FrameSet::new(),
            average_path: None,
        }
    }

    fn aggregated(track: TrackId, report: AggregateReport) -> Event {
        Event::Aggregated { track, report }
    }

    fn start(track: TrackId, operation: Operation) -> Effect {
        Effect::Start { track, operation }
    }

    fn finished(effects: &[Effect]) -> Option<&JobOutcome> {
        effects.iter().find_map(|e| match e {
            Effect::Finished(outcome) => Some(outcome),
            _ => None,
        })
    }

    fn emitted(effects: &[Effect], severity: Severity) -> Vec<String> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Emit(m) if m.severity == severity => Some(m.text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Run the primary track to the point where the dispatcher is running.
    fn rendering(kind: JobKind) -> JobMachine {
        let mut m = JobMachine::new(&job(kind), false);
        m.start();
        m.handle(exited(TrackId::Primary, 0));
        m.handle(Event::Started(TrackId::Primary));
        assert_eq!(*m.state(TrackId::Primary), PipelineState::Rendering);
        m
    }

    #[test]
    fn full_animation_run() {
        let mut m = JobMachine::new(&job(JobKind::Animation), true);
        let p = TrackId::Primary;

        assert_eq!(
            m.start(),
            vec![
                Effect::SetStatus(RenderStatus::Preparing),
                start(p, Operation::SyncSupport)
            ]
        );
        assert_eq!(
            m.handle(exited(p, 0)),
            vec![Effect::SupportSynced, start(p, Operation::SyncProject)]
        );
        assert_eq!(
            m.handle(exited(p, 0)),
            vec![
                Effect::SetStatus(RenderStatus::Rendering),
                start(p, Operation::Dispatch)
            ]
        );
        assert_eq!(*m.state(p), PipelineState::Dispatching);
        m.handle(Event::Started(p));
        assert_eq!(*m.state(p), PipelineState::Rendering);

        assert_eq!(
            m.handle(exited(p, 0)),
            vec![
                Effect::SetStatus(RenderStatus::Finishing),
                start(p, Operation::Fetch { archive: true })
            ]
        );
        assert_eq!(m.handle(exited(p, 0)), vec![Effect::Aggregate(p)]);

        let effects = m.handle(aggregated(p, report(4, 4, 0)));
        assert!(effects.contains(&Effect::MarkViewable(JobKind::Animation)));
        let outcome = finished(&effects).unwrap();
        assert_eq!(outcome.outcome, Outcome::Complete);
        assert_eq!(outcome.summary, "Render completed for 4/4 frames");
        assert_eq!(*m.state(p), PipelineState::Done);
        assert!(m.is_finished());
    }

    #[test]
    fn unchanged_pool_skips_support_sync() {
        let mut m = JobMachine::new(&job(JobKind::Image), false);
        assert_eq!(m.start()[1], start(TrackId::Primary, Operation::SyncProject));
    }

    #[test]
    fn image_run_reports_samples() {
        let mut m = rendering(JobKind::Image);
        m.handle(exited(TrackId::Primary, 0));
        m.handle(exited(TrackId::Primary, 0));

        let effects = m.handle(aggregated(TrackId::Primary, report(20, 20, 20)));
        assert!(effects.contains(&Effect::MarkViewable(JobKind::Image)));
        assert_eq!(
            finished(&effects).unwrap().summary,
            "Render completed at 200 samples"
        );
    }

    #[test]
    fn early_cancel_kills_immediately() {
        let mut m = JobMachine::new(&job(JobKind::Animation), true);
        m.start();

        let effects = m.handle(Event::CancelRequested);
        assert_eq!(effects[0], Effect::Kill(TrackId::Primary));
        let outcome = finished(&effects).unwrap();
        assert_eq!(outcome.outcome, Outcome::Cancelled);
        assert_eq!(outcome.summary, "Render process cancelled");
        assert_eq!(*m.state(TrackId::Primary), PipelineState::Cancelled);

        // Nothing happens once finished
        assert!(m.handle(exited(TrackId::Primary, 0)).is_empty());
    }

    #[test]
    fn late_cancel_salvages_before_cancelling() {
        let mut m = rendering(JobKind::Animation);
        let p = TrackId::Primary;

        let effects = m.handle(Event::CancelRequested);
        assert_eq!(
            effects,
            vec![
                Effect::SetStatus(RenderStatus::Finishing),
                Effect::Emit(Message::info("Render process cancelled. Fetching frames...")),
                Effect::Kill(p),
            ]
        );
        assert!(finished(&effects).is_none());

        // The killed connection leads into the salvage fetch
        let effects = m.handle(Event::Exited {
            track: p,
            exit: ProcessExit::default(),
        });
        assert_eq!(effects, vec![start(p, Operation::Fetch { archive: true })]);

        // A second cancel is absorbed
        assert!(m.handle(Event::CancelRequested).is_empty());

        m.handle(exited(p, 0));
        let effects = m.handle(aggregated(p, report(2, 4, 0)));
        let outcome = finished(&effects).unwrap();
        assert_eq!(outcome.outcome, Outcome::Cancelled);
        assert_eq!(outcome.summary, "Render cancelled. Fetched 2/4 frames");
    }

    #[test]
    fn late_cancel_with_nothing_fetched() {
        let mut m = rendering(JobKind::Image);
        m.handle(Event::CancelRequested);
        m.handle(exited(TrackId::Primary, 0));
        let effects = m.handle(exited(TrackId::Primary, 23));
        assert_eq!(effects, vec![Effect::Aggregate(TrackId::Primary)]);

        let effects = m.handle(aggregated(TrackId::Primary, report(0, 20, 0)));
        let outcome = finished(&effects).unwrap();
        assert_eq!(outcome.outcome, Outcome::Cancelled);
        assert_eq!(outcome.summary, NOTHING_SALVAGED);
    }

    #[test]
    fn empty_first_fetch_is_not_fatal() {
        let mut m = rendering(JobKind::Image);
        m.handle(exited(TrackId::Primary, 0));

        let effects = m.handle(exited(TrackId::Primary, 23));
        assert_eq!(effects, vec![Effect::Aggregate(TrackId::Primary)]);

        let effects = m.handle(aggregated(TrackId::Primary, report(0, 20, 0)));
        let outcome = finished(&effects).unwrap();
        assert_eq!(outcome.outcome, Outcome::Partial);
        assert_eq!(outcome.summary, "No render files found on host server");
        assert!(!effects.contains(&Effect::MarkViewable(JobKind::Image)));
    }

    #[test]
    fn missing_tooling_stops_the_job() {
        let mut m = rendering(JobKind::Animation);

        let effects = m.handle(exited(TrackId::Primary, 127));
        assert!(!effects.iter().any(|e| matches!(e, Effect::Start { .. })));
        let outcome = finished(&effects).unwrap();
        assert_eq!(outcome.outcome, Outcome::Failed);
        assert!(outcome.summary.contains("not installed on host server"));
        assert!(matches!(
            m.state(TrackId::Primary),
            PipelineState::Failed(Failure {
                kind: FailureKind::ToolingMissing,
                stage: Stage::Dispatch,
                ..
            })
        ));
    }

    #[test]
    fn unidentified_failure_surfaces_stderr() {
        let mut m = JobMachine::new(&job(JobKind::Animation), false);
        m.start();

        let effects = m.handle(exited_with(TrackId::Primary, 12, &["rsync: connection reset", ""]));
        assert_eq!(
            emitted(&effects, Severity::Warning),
            vec!["rsync: connection reset"]
        );
        assert_eq!(
            finished(&effects).unwrap().summary,
            "Track 0 at stage 2 gave return code 12. Error message available in the job log."
        );
    }

    #[test]
    fn dispatcher_failure_names_the_dispatcher() {
        let mut m = rendering(JobKind::Animation);
        let effects = m.handle(exited(TrackId::Primary, 2));
        assert_eq!(
            finished(&effects).unwrap().summary,
            "dispatcher gave return code 2. No error message to print."
        );
    }

    #[test]
    fn partial_failure_is_folded_into_report() {
        let mut m = rendering(JobKind::Animation);
        let p = TrackId::Primary;

        let effects = m.handle(exited_with(p, 1, &["node2 lost", "3 frames failed"]));
        assert_eq!(emitted(&effects, Severity::Warning).len(), 2);
        assert!(effects.contains(&start(p, Operation::Fetch { archive: true })));
        assert_eq!(m.failed_frames(), 3);

        m.handle(exited(p, 0));
        let effects = m.handle(aggregated(p, report(1, 4, 0)));
        let outcome = finished(&effects).unwrap();
        assert_eq!(outcome.outcome, Outcome::Partial);
        assert_eq!(outcome.summary, "Render completed for 1/4 frames (3 failed remotely)");
    }

    #[test]
    fn unreadable_failure_count_is_only_a_warning() {
        let mut m = rendering(JobKind::Animation);
        let effects = m.handle(exited_with(TrackId::Primary, 1, &["garbled"]));
        assert!(emitted(&effects, Severity::Warning)
            .iter()
            .any(|w| w.contains("failed frame count")));
        assert!(!m.is_finished());
        assert_eq!(m.failed_frames(), 0);
    }

    #[test]
    fn spawn_failure_is_fatal() {
        let mut m = JobMachine::new(&job(JobKind::Image), true);
        m.start();
        let effects = m.handle(Event::SpawnFailed {
            track: TrackId::Primary,
            message: "No such file or directory".to_string(),
        });
        let outcome = finished(&effects).unwrap();
        assert_eq!(outcome.outcome, Outcome::Failed);
        assert_eq!(
            outcome.summary,
            "Could not start sync support files: No such file or directory"
        );
    }

    #[test]
    fn probe_before_dispatch_is_refused() {
        let mut m = JobMachine::new(&job(JobKind::Animation), true);
        m.start();
        let effects = m.handle(Event::ProbeRequested);
        assert_eq!(
            emitted(&effects, Severity::Warning),
            vec!["Files are still transferring - try again in a moment"]
        );
        assert_eq!(*m.state(TrackId::Secondary), PipelineState::Idle);
    }

    #[test]
    fn probe_runs_alongside_render() {
        let mut m = rendering(JobKind::Image);
        let s = TrackId::Secondary;

        let effects = m.handle(Event::ProbeRequested);
        assert_eq!(
            effects,
            vec![
                Effect::Emit(Message::info("Preparing render preview...")),
                start(s, Operation::Fetch { archive: true }),
            ]
        );

        // Only one probe at a time
        assert!(m.handle(Event::ProbeRequested).is_empty());

        assert_eq!(m.handle(exited(s, 0)), vec![Effect::Aggregate(s)]);
        let effects = m.handle(aggregated(s, report(4, 20, 4)));
        assert_eq!(
            emitted(&effects, Severity::Info),
            vec!["Render preview loaded (40 samples)"]
        );
        assert!(effects.contains(&Effect::MarkViewable(JobKind::Image)));
        assert_eq!(*m.state(s), PipelineState::Done);
        assert!(!m.is_finished());

        // Results were archived by the probe; the final fetch keeps them
        let effects = m.handle(exited(TrackId::Primary, 0));
        assert_eq!(
            effects,
            vec![
                Effect::SetStatus(RenderStatus::Finishing),
                start(TrackId::Primary, Operation::Fetch { archive: false })
            ]
        );
    }

    #[test]
    fn first_empty_probe_resets_secondary() {
        let mut m = rendering(JobKind::Animation);
        let s = TrackId::Secondary;
        m.handle(Event::ProbeRequested);

        let effects = m.handle(exited(s, 23));
        assert_eq!(
            emitted(&effects, Severity::Warning),
            vec!["No render files found - try again in a moment"]
        );
        assert_eq!(*m.state(s), PipelineState::Idle);

        // The archive step already ran
        let effects = m.handle(Event::ProbeRequested);
        assert!(effects.contains(&start(s, Operation::Fetch { archive: false })));
    }

    #[test]
    fn dispatch_end_kills_running_probe() {
        let mut m = rendering(JobKind::Animation);
        m.handle(Event::ProbeRequested);

        let effects = m.handle(exited(TrackId::Primary, 0));
        assert_eq!(effects[0], Effect::Kill(TrackId::Secondary));
        assert_eq!(*m.state(TrackId::Secondary), PipelineState::Cancelled);
        // The probe never completed, so the primary fetch still archives
        assert!(effects.contains(&start(TrackId::Primary, Operation::Fetch { archive: true })));

        // Its late exit is ignored
        assert!(m.handle(exited(TrackId::Secondary, 0)).is_empty());
    }

    #[test]
    fn primary_failure_kills_probe_in_same_step() {
        let mut m = rendering(JobKind::Animation);
        m.handle(Event::ProbeRequested);

        let effects = m.handle(exited(TrackId::Primary, 127));
        assert!(effects.contains(&Effect::Kill(TrackId::Secondary)));
        assert_eq!(finished(&effects).unwrap().outcome, Outcome::Failed);
        assert_eq!(*m.state(TrackId::Secondary), PipelineState::Cancelled);
    }

    #[test]
    fn probe_failure_ends_the_job() {
        let mut m = rendering(JobKind::Animation);
        m.handle(Event::ProbeRequested);

        let effects = m.handle(exited(TrackId::Secondary, 255));
        assert!(effects.contains(&Effect::Kill(TrackId::Primary)));
        let outcome = finished(&effects).unwrap();
        assert_eq!(
            outcome.summary,
            "Track 1 at stage 4 gave return code 255. No error message to print."
        );
    }

    #[test]
    fn probe_aggregation_failure_is_a_warning() {
        let mut m = rendering(JobKind::Image);
        m.handle(Event::ProbeRequested);
        m.handle(exited(TrackId::Secondary, 0));

        let effects = m.handle(Event::AggregateFailed {
            track: TrackId::Secondary,
            message: "bad png".to_string(),
        });
        assert_eq!(
            emitted(&effects, Severity::Warning),
            vec!["Status check failed: bad png"]
        );
        assert!(!m.is_finished());
        assert_eq!(*m.state(TrackId::Secondary), PipelineState::Idle);
    }
}
