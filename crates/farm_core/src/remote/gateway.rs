//! Remote sync gateway.
//!
//! Wraps the four remote operations a job needs. Each call does any quick
//! local preparation, starts the external command(s) and returns a handle
//! immediately; completion is observed by polling the handle.
//!
//! Remote layout under the staging path `R`:
//!
//! ```text
//! R/servers.txt               pool membership for the dispatcher
//! R/<dispatcher>              support files synced from the client
//! R/<project>/toRemote/       project snapshot
//! R/<project>/results/        finished files, removed once fetched
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::command::{CommandSpec, RemoteExec, SyncCommand, SyncOptions};
use super::errors::{RemoteError, RemoteResult};
use super::process::{ProcessChain, ProcessHandle, Spawner};
use crate::config::Settings;
use crate::frames::{average_file_name, FrameSet};
use crate::models::{Job, JobKind};

/// Name of the pool membership file read by the dispatcher.
pub const SERVERS_FILE: &str = "servers.txt";

/// Subdirectory of the result directory that holds archived files.
pub const BACKUP_DIR: &str = "backups";

/// Connection details and local directories used by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub host_login: String,
    /// Remote staging path, ending in `/`.
    pub remote_path: String,
    pub dispatcher: String,
    pub interpreter: String,
    pub ssh_program: String,
    pub rsync_program: String,
    pub scratch_dir: PathBuf,
    pub support_dir: PathBuf,
}

impl From<&Settings> for GatewayConfig {
    fn from(settings: &Settings) -> Self {
        let mut remote_path = settings.remote.remote_path.clone();
        if !remote_path.ends_with('/') {
            remote_path.push('/');
        }
        Self {
            host_login: settings.remote.host_login.clone(),
            remote_path,
            dispatcher: settings.remote.dispatcher.clone(),
            interpreter: settings.remote.interpreter.clone(),
            ssh_program: settings.remote.ssh_program.clone(),
            rsync_program: settings.remote.rsync_program.clone(),
            scratch_dir: PathBuf::from(&settings.paths.scratch_dir),
            support_dir: PathBuf::from(&settings.paths.support_files_dir),
        }
    }
}

/// Adapter that turns job operations into transfer and ssh commands.
pub struct RemoteSyncGateway {
    config: GatewayConfig,
    spawner: Arc<dyn Spawner>,
}

impl RemoteSyncGateway {
    pub fn new(config: GatewayConfig, spawner: Arc<dyn Spawner>) -> Self {
        Self { config, spawner }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Write the pool membership file and sync the support files directory
    /// to the remote staging path.
    pub fn push_support_files(&self, hosts: &[String]) -> RemoteResult<Box<dyn ProcessHandle>> {
        write_servers_file(&self.config.support_dir, hosts)?;
        self.start(self.support_specs())
    }

    /// Snapshot the project file into scratch space and transfer it to the
    /// project's remote staging directory.
    pub fn push_project(&self, job: &Job) -> RemoteResult<Box<dyn ProcessHandle>> {
        fs::create_dir_all(&self.config.scratch_dir)
            .map_err(|e| RemoteError::io("creating scratch directory", e))?;
        self.start(self.project_specs(job))
    }

    /// Run the remote dispatcher over `frames`.
    pub fn dispatch_render(
        &self,
        job: &Job,
        frames: &FrameSet,
    ) -> RemoteResult<Box<dyn ProcessHandle>> {
        self.start(vec![self.dispatch_spec(job, frames)])
    }

    /// Pull finished files into the result directory, optionally moving the
    /// previous contents (except the running average) into `backups/` first.
    pub fn fetch_results(
        &self,
        job: &Job,
        archive_old: bool,
    ) -> RemoteResult<Box<dyn ProcessHandle>> {
        fs::create_dir_all(&job.result_dir)
            .map_err(|e| RemoteError::io("creating result directory", e))?;
        self.start(self.fetch_specs(job, archive_old))
    }

    fn start(&self, specs: Vec<CommandSpec>) -> RemoteResult<Box<dyn ProcessHandle>> {
        Ok(Box::new(ProcessChain::start(Arc::clone(&self.spawner), specs)?))
    }

    fn remote_dest(&self, path: &str) -> String {
        format!("{}:{}", self.config.host_login, path)
    }

    fn project_remote_dir(&self, job: &Job) -> String {
        format!("{}{}/", self.config.remote_path, job.project)
    }

    fn rsync(&self, cmd: SyncCommand) -> CommandSpec {
        cmd.to_spec(&self.config.rsync_program, &self.config.ssh_program)
    }

    pub fn support_specs(&self) -> Vec<CommandSpec> {
        let remote_path = self.config.remote_path.clone();
        let cmd = SyncCommand::new(dir_contents(&self.config.support_dir), self.remote_dest(&remote_path))
            .with_options(SyncOptions {
                archive: true,
                remote: true,
                create_remote_dir: Some(remote_path),
                ..SyncOptions::default()
            });
        vec![self.rsync(cmd)]
    }

    pub fn project_specs(&self, job: &Job) -> Vec<CommandSpec> {
        let snapshot = self.config.scratch_dir.join(snapshot_name(job));
        let snapshot = snapshot.to_string_lossy().into_owned();
        let to_remote = format!("{}toRemote/", self.project_remote_dir(job));

        let local = SyncCommand::new(job.project_file.to_string_lossy(), snapshot.clone())
            .with_options(SyncOptions {
                copy_links: true,
                ..SyncOptions::default()
            });
        let upload = SyncCommand::new(snapshot, self.remote_dest(&to_remote)).with_options(
            SyncOptions {
                archive: true,
                copy_links: true,
                compress: job.compress,
                remote: true,
                create_remote_dir: Some(to_remote),
                ..SyncOptions::default()
            },
        );
        vec![self.rsync(local), self.rsync(upload)]
    }

    pub fn dispatch_spec(&self, job: &Job, frames: &FrameSet) -> CommandSpec {
        let remote = &self.config.remote_path;
        let mut exec = RemoteExec::new(&self.config.interpreter)
            .arg(format!("{}{}", remote, self.config.dispatcher))
            .arg("-v")
            .arg("-p")
            .opt("-n", &job.project)
            .opt("-l", frames.to_canonical())
            .opt("--hosts_file", format!("{}{}", remote, SERVERS_FILE))
            .opt("-R", remote)
            .opt("--connection_timeout", job.timeout_secs.to_string())
            .opt("--max_server_load", job.max_server_load.to_string());

        if job.custom_prefix {
            exec = exec.opt("-O", &job.output_prefix);
        }
        if job.kind == JobKind::Image {
            exec = exec.arg("-a").opt("-j", job.jobs_per_frame.to_string());
        }

        exec.to_spec(&self.config.ssh_program, &self.config.host_login)
    }

    pub fn fetch_specs(&self, job: &Job, archive_old: bool) -> Vec<CommandSpec> {
        let dump = dir_contents(&job.result_dir);
        let mut specs = Vec::new();

        if archive_old {
            let backups = format!("{}{}/", dump, BACKUP_DIR);
            let archive = SyncCommand::new(dump.clone(), backups).with_options(SyncOptions {
                archive: true,
                remove_source: true,
                exclude: vec![
                    format!("/{}/", BACKUP_DIR),
                    average_file_name(&job.output_prefix, "*"),
                ],
                ..SyncOptions::default()
            });
            specs.push(self.rsync(archive));
        }

        let results = format!("{}results/*", self.project_remote_dir(job));
        let fetch = SyncCommand::new(self.remote_dest(&results), dump).with_options(SyncOptions {
            remove_source: true,
            remote: true,
            exclude: vec!["*.blend".to_string()],
            ..SyncOptions::default()
        });
        specs.push(self.rsync(fetch));
        specs
    }
}

/// `dir/` so rsync copies the directory's contents.
fn dir_contents(dir: &Path) -> String {
    let mut s = dir.to_string_lossy().into_owned();
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}

/// File name of the project snapshot in scratch space.
fn snapshot_name(job: &Job) -> String {
    let ext = job
        .project_file
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "blend".to_string());
    format!("{}.{}", job.project, ext)
}

/// Write one host per line to `dir/servers.txt`.
pub fn write_servers_file(dir: &Path, hosts: &[String]) -> RemoteResult<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| RemoteError::io("creating support directory", e))?;
    let path = dir.join(SERVERS_FILE);
    let mut content = hosts.join("\n");
    content.push('\n');
    fs::write(&path, content).map_err(|e| RemoteError::io("writing servers file", e))?;
    Ok(path)
}
