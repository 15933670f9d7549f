//! Job and scene description types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::enums::{JobKind, OutputFormat, RenderEngine};
use crate::frames::FrameSet;

/// Snapshot of the scene the host application wants rendered.
///
/// Hosts serialize this as JSON (see the CLI's `--scene` argument); every
/// field has a default so partial descriptions are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneState {
    /// Saved project file. Empty when the project was never saved.
    #[serde(default)]
    pub project_file: PathBuf,

    /// Whether the scene has an active camera.
    #[serde(default = "default_true")]
    pub has_camera: bool,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default)]
    pub engine: RenderEngine,

    /// Sample budget for a single frame on a sampling engine.
    #[serde(default = "default_max_samples")]
    pub max_samples: u32,

    #[serde(default = "default_frame")]
    pub frame_current: u32,

    #[serde(default = "default_frame")]
    pub frame_start: u32,

    #[serde(default = "default_frame_end")]
    pub frame_end: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_samples() -> u32 {
    1000
}

fn default_frame() -> u32 {
    1
}

fn default_frame_end() -> u32 {
    250
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            project_file: PathBuf::new(),
            has_camera: true,
            output_format: OutputFormat::default(),
            engine: RenderEngine::default(),
            max_samples: default_max_samples(),
            frame_current: default_frame(),
            frame_start: default_frame(),
            frame_end: default_frame_end(),
        }
    }
}

impl SceneState {
    /// Sanitized project identifier derived from the project file name.
    ///
    /// Empty when the project has not been saved.
    pub fn project_identifier(&self) -> String {
        self.project_file
            .file_stem()
            .map(|stem| sanitize_project_name(&stem.to_string_lossy()))
            .unwrap_or_default()
    }

    /// Directory containing the project file.
    pub fn project_dir(&self) -> &Path {
        self.project_file.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// Make a project name safe for remote paths and shell arguments.
///
/// Spaces become underscores and quote characters are dropped.
pub fn sanitize_project_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| *c != '\'' && *c != '"')
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Per-submission options supplied by the caller.
///
/// Unset values fall back to the `[render]` settings section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default)]
    pub compress: Option<bool>,
    #[serde(default)]
    pub samples_per_job: Option<u32>,
    #[serde(default)]
    pub max_server_load: Option<u32>,
    #[serde(default)]
    pub timeout_secs: Option<u32>,
    /// Output file name prefix. Defaults to the project identifier.
    #[serde(default)]
    pub output_prefix: Option<String>,
}

/// One render request, owned by the state machine processing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Process-unique job number.
    pub id: u64,
    pub kind: JobKind,
    /// Sanitized project identifier (no spaces or quotes).
    pub project: String,
    /// Packed project file to transfer.
    pub project_file: PathBuf,
    pub frames: FrameSet,
    /// Prefix used for output file names.
    pub output_prefix: String,
    /// Whether a non-default prefix must be passed to the dispatcher.
    pub custom_prefix: bool,
    /// Output file extension without the dot.
    pub extension: String,
    pub compress: bool,
    pub samples_per_job: u32,
    /// Independent samples requested for image jobs (1 for animations).
    pub jobs_per_frame: u32,
    pub max_server_load: u32,
    pub timeout_secs: u32,
    /// Local directory results are fetched into.
    pub result_dir: PathBuf,
}

impl Job {
    /// Number of frames the job was asked to render.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Name of the job log file and registry entry.
    pub fn display_name(&self) -> String {
        format!("{}_{}_{}", self.project, self.kind, self.id)
    }
}
