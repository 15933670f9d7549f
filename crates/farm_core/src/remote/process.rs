//! Handles to asynchronously running external operations.
//!
//! Every remote operation is observed through [`ProcessHandle::poll`], which
//! never blocks. Standard error is read on a helper thread so a chatty
//! process cannot stall on a full pipe.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::command::CommandSpec;
use super::errors::{RemoteError, RemoteResult};

/// Polls to wait for the stderr reader after the process has exited.
const READER_GRACE_POLLS: u32 = 20;

/// How a finished process ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessExit {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Every stderr line the process produced.
    pub stderr: Vec<String>,
}

impl ProcessExit {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            stderr: Vec::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Result of a non-blocking poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessPoll {
    Running,
    Exited(ProcessExit),
    /// A later step of a chained operation could not be started.
    SpawnFailed(String),
}

/// An external operation in flight.
pub trait ProcessHandle: Send {
    /// Check for completion without blocking.
    fn poll(&mut self) -> ProcessPoll;

    /// Stderr lines produced since the previous call.
    fn take_output(&mut self) -> Vec<String>;

    /// Terminate the operation. The next poll reports its exit.
    fn kill(&mut self);

    /// Command line for logs.
    fn describe(&self) -> String;
}

/// Starts processes. Swapped for a scripted fake in tests.
pub trait Spawner: Send + Sync {
    fn spawn(&self, spec: &CommandSpec) -> RemoteResult<Box<dyn ProcessHandle>>;
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl Spawner for SystemSpawner {
    fn spawn(&self, spec: &CommandSpec) -> RemoteResult<Box<dyn ProcessHandle>> {
        Ok(Box::new(ChildProcess::spawn(spec)?))
    }
}

/// A child process with its stderr collected in the background.
pub struct ChildProcess {
    child: Child,
    description: String,
    lines: Arc<Mutex<Vec<String>>>,
    reported: usize,
    reader: Option<JoinHandle<()>>,
    exit_code: Option<Option<i32>>,
    grace_polls: u32,
}

impl ChildProcess {
    pub fn spawn(spec: &CommandSpec) -> RemoteResult<Self> {
        let description = spec.to_string();
        tracing::debug!("Spawning: {}", description);

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RemoteError::spawn(&spec.program, e))?;

        let lines = Arc::new(Mutex::new(Vec::new()));
        let reader = child.stderr.take().map(|stderr| {
            let lines = Arc::clone(&lines);
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(line) => lines.lock().push(line),
                        Err(_) => break,
                    }
                }
            })
        });

        Ok(Self {
            child,
            description,
            lines,
            reported: 0,
            reader,
            exit_code: None,
            grace_polls: 0,
        })
    }

    fn reader_done(&mut self) -> bool {
        match &self.reader {
            Some(handle) if !handle.is_finished() => {
                self.grace_polls += 1;
                self.grace_polls > READER_GRACE_POLLS
            }
            _ => true,
        }
    }
}

impl ProcessHandle for ChildProcess {
    fn poll(&mut self) -> ProcessPoll {
        if self.exit_code.is_none() {
            match self.child.try_wait() {
                Ok(Some(status)) => self.exit_code = Some(status.code()),
                Ok(None) => return ProcessPoll::Running,
                Err(e) => {
                    tracing::warn!("Failed to poll '{}': {}", self.description, e);
                    self.exit_code = Some(None);
                }
            }
        }

        // Let the reader drain what the process wrote before exiting
        if !self.reader_done() {
            return ProcessPoll::Running;
        }

        ProcessPoll::Exited(ProcessExit {
            code: self.exit_code.flatten(),
            stderr: self.lines.lock().clone(),
        })
    }

    fn take_output(&mut self) -> Vec<String> {
        let lines = self.lines.lock();
        let new = lines[self.reported..].to_vec();
        self.reported = lines.len();
        new
    }

    fn kill(&mut self) {
        if self.exit_code.is_some() {
            return;
        }
        if let Err(e) = self.child.kill() {
            tracing::debug!("Kill of '{}' failed: {}", self.description, e);
        }
        // Reap the killed child
        match self.child.wait() {
            Ok(status) => self.exit_code = Some(status.code()),
            Err(e) => {
                tracing::warn!("Failed to reap '{}': {}", self.description, e);
                self.exit_code = Some(None);
            }
        }
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.exit_code.is_none() {
            self.kill();
        }
    }
}

/// Runs commands one after another as a single operation.
///
/// Stops at the first step that exits nonzero and reports that step's exit;
/// otherwise reports the exit of the last step.
pub struct ProcessChain {
    spawner: Arc<dyn Spawner>,
    pending: VecDeque<CommandSpec>,
    current: Box<dyn ProcessHandle>,
    /// Output of finished steps not yet taken.
    carried: Vec<String>,
    description: String,
    killed: bool,
}

impl ProcessChain {
    /// Start the first command; the rest are spawned as each one succeeds.
    pub fn start(spawner: Arc<dyn Spawner>, specs: Vec<CommandSpec>) -> RemoteResult<Self> {
        let description = specs
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" && ");
        let mut pending: VecDeque<CommandSpec> = specs.into();
        let first = pending
            .pop_front()
            .ok_or_else(|| RemoteError::invalid("empty command chain"))?;
        let current = spawner.spawn(&first)?;

        Ok(Self {
            spawner,
            pending,
            current,
            carried: Vec::new(),
            description,
            killed: false,
        })
    }
}

impl ProcessHandle for ProcessChain {
    fn poll(&mut self) -> ProcessPoll {
        loop {
            match self.current.poll() {
                ProcessPoll::Exited(exit) if exit.success() && !self.killed => {
                    let Some(next) = self.pending.pop_front() else {
                        return ProcessPoll::Exited(exit);
                    };
                    self.carried.extend(self.current.take_output());
                    match self.spawner.spawn(&next) {
                        Ok(handle) => self.current = handle,
                        Err(e) => return ProcessPoll::SpawnFailed(e.to_string()),
                    }
                }
                other => return other,
            }
        }
    }

    fn take_output(&mut self) -> Vec<String> {
        let mut lines = std::mem::take(&mut self.carried);
        lines.extend(self.current.take_output());
        lines
    }

    fn kill(&mut self) {
        self.killed = true;
        self.pending.clear();
        self.current.kill();
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}
