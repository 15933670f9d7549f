//! Render farm client - command line host.
//!
//! Loads settings, submits one job built from the arguments and a scene
//! description, then drives the scheduler until the job ends. While a job
//! runs, type `c` (cancel) or `p` (probe) followed by Enter.

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use farm_core::aggregate;
use farm_core::config::{ConfigManager, ConfigSection, Settings, ALL_SERVERS};
use farm_core::frames;
use farm_core::logging::{init_tracing_with_file, LogCallback, LogLevel};
use farm_core::models::{JobKind, JobOptions, SceneState};
use farm_core::orchestrator::{JobHandle, Outcome, RenderFarm};

/// Submit render jobs to a remote render farm.
#[derive(Parser, Debug)]
#[command(name = "render-farm", author, version, about, long_about = None)]
struct Cli {
    /// Settings file (created with defaults if missing)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one frame as independent samples and average them
    Image {
        /// Frame to render (defaults to the scene's current frame)
        #[arg(short, long)]
        frame: Option<String>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Render a frame range, one file per frame
    Animation {
        /// Frame range such as "1-10, 15" (defaults to the scene's range)
        #[arg(short, long, default_value = "")]
        frames: String,

        #[command(flatten)]
        job: JobArgs,
    },

    /// List frames of a range that have no result file yet
    Missing {
        /// Frame range to check
        #[arg(short, long)]
        frames: String,

        /// Result directory
        #[arg(long)]
        dir: PathBuf,

        /// Output file prefix
        #[arg(short, long)]
        prefix: String,
    },

    /// Average every sample file for a prefix into `{prefix}_average.{ext}`
    Average {
        /// Result directory
        #[arg(long)]
        dir: PathBuf,

        /// Output file prefix
        #[arg(short, long)]
        prefix: String,

        /// Output file extension
        #[arg(short, long, default_value = "png")]
        ext: String,
    },

    /// Show server groups, or select the active group
    Servers {
        /// Group to make active
        #[arg(long)]
        select: Option<String>,
    },
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Scene description (JSON)
    #[arg(short, long)]
    scene: PathBuf,

    /// Compress project transfers
    #[arg(long)]
    compress: bool,

    /// Samples per remote sub-job (image jobs)
    #[arg(long)]
    samples_per_job: Option<u32>,

    /// Concurrent jobs allowed per server
    #[arg(long)]
    max_server_load: Option<u32>,

    /// Connection timeout in seconds
    #[arg(long)]
    timeout: Option<u32>,

    /// Output file prefix
    #[arg(long)]
    prefix: Option<String>,
}

impl JobArgs {
    fn options(&self) -> JobOptions {
        JobOptions {
            compress: self.compress.then_some(true),
            samples_per_job: self.samples_per_job,
            max_server_load: self.max_server_load,
            timeout_secs: self.timeout,
            output_prefix: self.prefix.clone(),
        }
    }
}

/// Default config path: `<config dir>/render-farm/settings.toml`.
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("render-farm")
        .join("settings.toml")
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = ConfigManager::new(&config_path);
    if let Err(e) = config.load_or_create() {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
    }

    let level = if cli.debug {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    let _log_guard = init_tracing_with_file(level, &config.logs_folder());

    tracing::info!("Render farm client {}", farm_core::version());
    tracing::info!("Config: {}", config_path.display());

    match cli.command {
        Command::Image { frame, job } => {
            let frame = frame.unwrap_or_default();
            run_job(&config, JobKind::Image, &frame, &job)
        }
        Command::Animation { frames, job } => run_job(&config, JobKind::Animation, &frames, &job),
        Command::Missing {
            frames,
            dir,
            prefix,
        } => {
            print_missing(&frames, &dir, &prefix)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Average { dir, prefix, ext } => {
            average_samples(&dir, &prefix, &ext)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Servers { select } => {
            servers(&mut config, select)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_job(config: &ConfigManager, kind: JobKind, range: &str, args: &JobArgs) -> Result<ExitCode> {
    if let Err(e) = config.ensure_dirs_exist() {
        tracing::error!("Failed to create directories: {}", e);
    }

    let scene = load_scene(&args.scene)?;
    let farm = RenderFarm::with_system_spawner(config.settings().clone());

    let callback: LogCallback = Box::new(|line: &str| println!("{}", line));
    let mut submitted = match farm.submit(kind, range, &scene, &args.options(), Some(callback)) {
        Ok(submitted) => submitted,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("Log: {}", submitted.runner.log_path().display());

    spawn_command_reader(submitted.handle.clone());

    let outcome = submitted.runner.run(farm.tick_interval());
    tracing::info!("Final registry state: {:?}", farm.registry().snapshot());

    Ok(match outcome.outcome {
        Outcome::Failed => ExitCode::FAILURE,
        Outcome::Complete | Outcome::Partial | Outcome::Cancelled => ExitCode::SUCCESS,
    })
}

fn load_scene(path: &Path) -> Result<SceneState> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scene file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse scene file {}", path.display()))
}

/// Forward `cancel` and `probe` lines from stdin to the running job.
fn spawn_command_reader(handle: JobHandle) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let sent = match line.trim() {
                "c" | "cancel" => handle.cancel(),
                "p" | "probe" => handle.request_status_probe(),
                "" => true,
                other => {
                    eprintln!("Unknown command '{}' (use cancel or probe)", other);
                    true
                }
            };
            if !sent {
                break;
            }
        }
    });
}

fn print_missing(range: &str, dir: &Path, prefix: &str) -> Result<()> {
    let expected = frames::parse(range).context("Invalid frame ranges given")?;
    let names = frames::list_file_names(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    let missing = frames::missing(&expected, names.iter().map(String::as_str), prefix);

    if missing.is_empty() {
        println!("No missing frames");
    } else {
        println!("{}", frames::render(&missing));
    }
    Ok(())
}

fn average_samples(dir: &Path, prefix: &str, ext: &str) -> Result<()> {
    let names = frames::list_file_names(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    let samples: Vec<PathBuf> = names
        .iter()
        .filter(|name| frames::is_sample_file(name, prefix))
        .map(|name| dir.join(name))
        .collect();
    if samples.is_empty() {
        bail!("No sample files for '{}' in {}", prefix, dir.display());
    }

    let output = dir.join(frames::average_file_name(prefix, ext));
    aggregate::average_files(&samples, &output).context("Failed to average samples")?;
    println!("Averaged {} samples into {}", samples.len(), output.display());
    Ok(())
}

fn servers(config: &mut ConfigManager, select: Option<String>) -> Result<()> {
    if let Some(group) = select {
        if group != ALL_SERVERS && !config.settings().servers.groups.contains_key(&group) {
            bail!("Unknown server group '{}'", group);
        }
        config.settings_mut().servers.active_group = group;
        config
            .update_section(ConfigSection::Servers)
            .context("Failed to save server settings")?;
    }

    print_servers(config.settings());
    Ok(())
}

fn print_servers(settings: &Settings) {
    let servers = &settings.servers;
    for (name, hosts) in &servers.groups {
        let marker = if *name == servers.active_group { "*" } else { " " };
        println!("{} {} ({})", marker, name, hosts.join(", "));
    }
    let marker = if servers.active_group == ALL_SERVERS {
        "*"
    } else {
        " "
    };
    println!("{} {}", marker, ALL_SERVERS);
    println!("Active hosts: {}", servers.active_hosts().join(", "));
}
