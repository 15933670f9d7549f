//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Group name that selects every configured host.
pub const ALL_SERVERS: &str = "All Servers";

/// Valid range for `render.max_server_load`.
pub const MAX_SERVER_LOAD_RANGE: std::ops::RangeInclusive<u32> = 1..=50;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Local directories.
    #[serde(default)]
    pub paths: PathSettings,

    /// Remote host and tooling.
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Server pool membership.
    #[serde(default)]
    pub servers: ServerSettings,

    /// Per-job render defaults.
    #[serde(default)]
    pub render: RenderSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Clamp out-of-range values in place.
    ///
    /// Returns true if anything changed.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;

        let load = self.render.max_server_load;
        let clamped = load.clamp(*MAX_SERVER_LOAD_RANGE.start(), *MAX_SERVER_LOAD_RANGE.end());
        if clamped != load {
            self.render.max_server_load = clamped;
            changed = true;
        }

        if self.render.samples_per_job == 0 {
            self.render.samples_per_job = default_samples_per_job();
            changed = true;
        }

        if self.render.tick_interval_ms == 0 {
            self.render.tick_interval_ms = default_tick_interval_ms();
            changed = true;
        }

        if !self.remote.remote_path.ends_with('/') {
            self.remote.remote_path.push('/');
            changed = true;
        }

        changed
    }
}

/// Local directories used by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Scratch directory for project snapshots before transfer.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// Results folder name, created next to the project file.
    #[serde(default = "default_result_dir_name")]
    pub result_dir_name: String,

    /// Folder for per-job log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Local folder holding the files synced to the remote staging path.
    #[serde(default = "default_support_files_dir")]
    pub support_files_dir: String,
}

fn default_scratch_dir() -> String {
    ".render_farm/scratch".to_string()
}

fn default_result_dir_name() -> String {
    "render-dump".to_string()
}

fn default_logs_folder() -> String {
    ".render_farm/logs".to_string()
}

fn default_support_files_dir() -> String {
    ".render_farm/to_host_server".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            result_dir_name: default_result_dir_name(),
            logs_folder: default_logs_folder(),
            support_files_dir: default_support_files_dir(),
        }
    }
}

/// Remote host login and the programs used to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// `user@host` of the machine that fans work out to the pool.
    #[serde(default)]
    pub host_login: String,

    /// Staging path on the remote host, always ending in `/`.
    #[serde(default = "default_remote_path")]
    pub remote_path: String,

    /// Dispatcher program name inside the staging path.
    #[serde(default = "default_dispatcher")]
    pub dispatcher: String,

    /// Interpreter used to run the dispatcher remotely.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,

    #[serde(default = "default_rsync_program")]
    pub rsync_program: String,
}

fn default_remote_path() -> String {
    "/tmp/render-farm/".to_string()
}

fn default_dispatcher() -> String {
    "blender_task".to_string()
}

fn default_interpreter() -> String {
    "python".to_string()
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

fn default_rsync_program() -> String {
    "rsync".to_string()
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            host_login: String::new(),
            remote_path: default_remote_path(),
            dispatcher: default_dispatcher(),
            interpreter: default_interpreter(),
            ssh_program: default_ssh_program(),
            rsync_program: default_rsync_program(),
        }
    }
}

/// Named groups of remote hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Group selected for new jobs; `"All Servers"` selects every host.
    #[serde(default = "default_active_group")]
    pub active_group: String,

    /// Group name to host names.
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
}

fn default_active_group() -> String {
    ALL_SERVERS.to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            active_group: default_active_group(),
            groups: BTreeMap::new(),
        }
    }
}

impl ServerSettings {
    /// Hosts of the active group, deduplicated, in configuration order.
    pub fn active_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        let selected: Vec<&Vec<String>> = if self.active_group == ALL_SERVERS {
            self.groups.values().collect()
        } else {
            self.groups.get(&self.active_group).into_iter().collect()
        };

        for group in selected {
            for host in group {
                let host = host.trim();
                if !host.is_empty() && !hosts.iter().any(|h| h == host) {
                    hosts.push(host.to_string());
                }
            }
        }
        hosts
    }
}

/// Defaults applied to each job unless overridden at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Concurrent jobs allowed per server (1..=50).
    #[serde(default = "default_max_server_load")]
    pub max_server_load: u32,

    /// Connection timeout passed to the dispatcher, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,

    /// Samples rendered by each remote sub-job of an image job.
    #[serde(default = "default_samples_per_job")]
    pub samples_per_job: u32,

    /// Compress project transfers.
    #[serde(default)]
    pub compress: bool,

    /// Scheduler tick interval in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Output file prefix; empty means the project identifier.
    #[serde(default)]
    pub output_prefix: String,
}

fn default_max_server_load() -> u32 {
    1
}

fn default_timeout_secs() -> u32 {
    15
}

fn default_samples_per_job() -> u32 {
    10
}

fn default_tick_interval_ms() -> u64 {
    100
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_server_load: default_max_server_load(),
            timeout_secs: default_timeout_secs(),
            samples_per_job: default_samples_per_job(),
            compress: false,
            tick_interval_ms: default_tick_interval_ms(),
            output_prefix: String::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Keep remote output in the tail buffer instead of echoing it.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of remote output lines kept for error reports.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Prefix log lines with a timestamp.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: default_error_tail(),
            show_timestamps: true,
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Remote,
    Servers,
    Render,
    Logging,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Remote => "remote",
            ConfigSection::Servers => "servers",
            ConfigSection::Render => "render",
            ConfigSection::Logging => "logging",
        }
    }

    pub fn all() -> &'static [ConfigSection] {
        &[
            ConfigSection::Paths,
            ConfigSection::Remote,
            ConfigSection::Servers,
            ConfigSection::Render,
            ConfigSection::Logging,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[render]"));
        assert!(toml.contains("result_dir_name"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[render]\nsamples_per_job = 25";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.render.samples_per_job, 25);
        assert_eq!(parsed.render.max_server_load, 1);
        assert_eq!(parsed.remote.dispatcher, "blender_task");
        assert_eq!(parsed.servers.active_group, ALL_SERVERS);
    }

    #[test]
    fn normalize_clamps_values() {
        let mut settings = Settings::default();
        settings.render.max_server_load = 80;
        settings.remote.remote_path = "/scratch/farm".to_string();

        assert!(settings.normalize());
        assert_eq!(settings.render.max_server_load, 50);
        assert_eq!(settings.remote.remote_path, "/scratch/farm/");
        assert!(!settings.normalize());
    }

    #[test]
    fn active_hosts_resolves_groups() {
        let mut servers = ServerSettings::default();
        servers
            .groups
            .insert("lab".to_string(), vec!["a".into(), "b".into()]);
        servers
            .groups
            .insert("office".to_string(), vec!["b".into(), " c ".into()]);

        assert_eq!(servers.active_hosts(), vec!["a", "b", "c"]);

        servers.active_group = "office".to_string();
        assert_eq!(servers.active_hosts(), vec!["b", "c"]);

        servers.active_group = "missing".to_string();
        assert!(servers.active_hosts().is_empty());
    }
}
