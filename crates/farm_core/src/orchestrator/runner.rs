//! Scheduler that drives a [`JobMachine`] on a fixed tick.
//!
//! Each tick drains host commands, polls every live process without
//! blocking, feeds completions to the machine and carries out the effects it
//! returns. Nothing here waits on a process; the only pause is the sleep
//! between ticks in [`JobRunner::run`].

use std::collections::VecDeque;
use std::path::Path;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::machine::JobMachine;
use super::registry::RenderStatusRegistry;
use super::types::{Effect, Event, JobCommand, JobOutcome, Operation, Outcome, TrackId};
use crate::aggregate::ResultAggregator;
use crate::logging::JobLogger;
use crate::models::{Job, JobKind};
use crate::remote::{ProcessHandle, ProcessPoll, RemoteResult, RemoteSyncGateway};

/// Last server group whose support files reached the remote host.
pub(crate) type SyncedGroup = Arc<Mutex<Option<String>>>;

/// Host-side handle for sending commands to a running job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: u64,
    kind: JobKind,
    commands: Sender<JobCommand>,
}

impl JobHandle {
    pub(crate) fn new(id: u64, kind: JobKind, commands: Sender<JobCommand>) -> Self {
        Self { id, kind, commands }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Ask the job to cancel. Returns false if the job has already ended.
    pub fn cancel(&self) -> bool {
        self.commands.send(JobCommand::Cancel).is_ok()
    }

    /// Ask for a status probe. Returns false if the job has already ended.
    pub fn request_status_probe(&self) -> bool {
        self.commands.send(JobCommand::Probe).is_ok()
    }
}

/// Server pool details needed to push support files.
pub(crate) struct SupportSync {
    pub group: String,
    pub hosts: Vec<String>,
    pub synced: SyncedGroup,
}

/// Owns one job's machine, its live processes and its logger.
pub struct JobRunner {
    job: Job,
    machine: JobMachine,
    gateway: Arc<RemoteSyncGateway>,
    registry: RenderStatusRegistry,
    logger: Arc<JobLogger>,
    aggregator: ResultAggregator,
    support: SupportSync,
    handles: [Option<Box<dyn ProcessHandle>>; 2],
    commands: Receiver<JobCommand>,
}

impl JobRunner {
    pub(crate) fn new(
        job: Job,
        sync_support: bool,
        gateway: Arc<RemoteSyncGateway>,
        registry: RenderStatusRegistry,
        logger: Arc<JobLogger>,
        support: SupportSync,
        commands: Receiver<JobCommand>,
    ) -> Self {
        Self {
            machine: JobMachine::new(&job, sync_support),
            aggregator: ResultAggregator::new(&job),
            job,
            gateway,
            registry,
            logger,
            support,
            handles: [None, None],
            commands,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn machine(&self) -> &JobMachine {
        &self.machine
    }

    pub fn log_path(&self) -> &Path {
        self.logger.log_path()
    }

    pub fn outcome(&self) -> Option<&JobOutcome> {
        self.machine.outcome()
    }

    /// Start the primary track.
    pub(crate) fn start(&mut self) {
        tracing::info!("Starting job {}", self.job.display_name());
        let mut events = VecDeque::new();
        for effect in self.machine.start() {
            self.apply(effect, &mut events);
        }
        self.process(events);
    }

    /// One non-blocking poll-and-react pass. Returns the outcome once the
    /// job has ended.
    pub fn tick(&mut self) -> Option<JobOutcome> {
        if let Some(outcome) = self.machine.outcome() {
            return Some(outcome.clone());
        }

        let mut events = VecDeque::new();
        while let Ok(command) = self.commands.try_recv() {
            events.push_back(match command {
                JobCommand::Cancel => Event::CancelRequested,
                JobCommand::Probe => Event::ProbeRequested,
            });
        }

        for track in [TrackId::Primary, TrackId::Secondary] {
            let i = track.index();
            let Some(handle) = self.handles[i].as_mut() else {
                continue;
            };
            for line in handle.take_output() {
                self.logger.remote_line(&line);
            }
            match handle.poll() {
                ProcessPoll::Running => {}
                ProcessPoll::Exited(exit) => {
                    self.handles[i] = None;
                    events.push_back(Event::Exited { track, exit });
                }
                ProcessPoll::SpawnFailed(message) => {
                    self.handles[i] = None;
                    events.push_back(Event::SpawnFailed { track, message });
                }
            }
        }

        self.process(events);
        self.machine.outcome().cloned()
    }

    /// Tick until the job ends.
    pub fn run(&mut self, interval: Duration) -> JobOutcome {
        loop {
            if let Some(outcome) = self.tick() {
                return outcome;
            }
            thread::sleep(interval);
        }
    }

    fn process(&mut self, mut events: VecDeque<Event>) {
        while let Some(event) = events.pop_front() {
            tracing::trace!("{} <- {:?}", self.job.display_name(), event);
            for effect in self.machine.handle(event) {
                self.apply(effect, &mut events);
            }
        }
    }

    fn apply(&mut self, effect: Effect, events: &mut VecDeque<Event>) {
        match effect {
            Effect::Start { track, operation } => {
                let stage = operation.stage();
                match track {
                    TrackId::Primary => self.logger.stage(stage.name()),
                    TrackId::Secondary => self.logger.stage(&format!("Status check: {}", stage)),
                }
                match self.launch(operation) {
                    Ok(handle) => {
                        self.logger.command(&handle.describe());
                        self.handles[track.index()] = Some(handle);
                        events.push_back(Event::Started(track));
                    }
                    Err(e) => {
                        tracing::warn!("Failed to start {}: {}", stage, e);
                        events.push_back(Event::SpawnFailed {
                            track,
                            message: e.to_string(),
                        });
                    }
                }
            }
            Effect::Kill(track) => {
                if let Some(handle) = self.handles[track.index()].as_mut() {
                    tracing::debug!("Killing {}", handle.describe());
                    handle.kill();
                }
            }
            Effect::Aggregate(track) => match self.aggregator.aggregate() {
                Ok(report) => {
                    self.logger.debug(&format!(
                        "Aggregated: {} new samples, {}/{} complete",
                        report.new_samples, report.completed, report.expected
                    ));
                    events.push_back(Event::Aggregated { track, report });
                }
                Err(e) => events.push_back(Event::AggregateFailed {
                    track,
                    message: e.to_string(),
                }),
            },
            Effect::SetStatus(status) => self.registry.set(self.job.kind, status),
            Effect::MarkViewable(kind) => self.registry.mark_viewable(kind),
            Effect::SupportSynced => {
                *self.support.synced.lock() = Some(self.support.group.clone());
            }
            Effect::Emit(message) => self.logger.message(message.severity, &message.text),
            Effect::Finished(outcome) => self.finish(&outcome),
        }
    }

    fn launch(&self, operation: Operation) -> RemoteResult<Box<dyn ProcessHandle>> {
        match operation {
            Operation::SyncSupport => self.gateway.push_support_files(&self.support.hosts),
            Operation::SyncProject => self.gateway.push_project(&self.job),
            Operation::Dispatch => self.gateway.dispatch_render(&self.job, &self.job.frames),
            Operation::Fetch { archive } => self.gateway.fetch_results(&self.job, archive),
        }
    }

    fn finish(&mut self, outcome: &JobOutcome) {
        for slot in self.handles.iter_mut() {
            if let Some(mut handle) = slot.take() {
                handle.kill();
            }
        }

        self.registry.set(self.job.kind, outcome.outcome.status());
        match outcome.outcome {
            Outcome::Complete => self.logger.success(&outcome.summary),
            Outcome::Partial => self.logger.warn(&outcome.summary),
            Outcome::Cancelled => self.logger.info(&outcome.summary),
            Outcome::Failed => {
                self.logger.error(&outcome.summary);
                self.logger.show_tail("Recent remote output");
            }
        }
        tracing::info!(
            "Job {} finished ({}): {}",
            self.job.display_name(),
            outcome.outcome.status(),
            outcome.summary
        );
        self.logger.flush();
    }
}
