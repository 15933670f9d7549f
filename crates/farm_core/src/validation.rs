//! Pre-submission job checks.
//!
//! Checks run in a fixed order and the first blocking failure wins. The only
//! I/O is creating the local result directory.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::models::{JobKind, SceneState, Severity};

/// Image jobs split into more remote sub-jobs than this are refused.
pub const MAX_JOBS_PER_FRAME: u32 = 100;

/// Per-job sample counts below this get an accuracy advisory.
pub const LOW_SAMPLE_ADVISORY: u32 = 10;

/// Everything the validator looks at.
#[derive(Debug, Clone)]
pub struct ValidationInput<'a> {
    pub kind: JobKind,
    /// Sanitized project identifier; empty when unsaved.
    pub project: &'a str,
    pub scene: &'a SceneState,
    pub samples_per_job: u32,
    pub result_dir: &'a Path,
    pub server_count: usize,
}

/// Outcome of validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub severity: Severity,
    pub message: String,
    /// Non-blocking note shown alongside an ok result.
    pub advisory: Option<String>,
}

impl ValidationResult {
    fn blocked(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            severity,
            message: message.into(),
            advisory: None,
        }
    }

    fn passed(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            severity: Severity::Info,
            message: message.into(),
            advisory: None,
        }
    }
}

/// Run all checks against a prospective job.
pub fn validate(input: &ValidationInput<'_>) -> ValidationResult {
    let scene = input.scene;

    if input.project.is_empty() {
        return ValidationResult::blocked(
            Severity::Warning,
            "RENDER FAILED: You have not saved your project file. Please save it before attempting to render.",
        );
    }

    let project_dir = scene.project_dir().to_string_lossy();
    if project_dir.contains('\'') || project_dir.contains('"') {
        return ValidationResult::blocked(
            Severity::Error,
            format!(
                "RENDER FAILED: Found illegal quotation in project path ({}). Please change the file/directory name before attempting to render.",
                project_dir
            ),
        );
    }

    if !scene.has_camera {
        return ValidationResult::blocked(Severity::Warning, "RENDER FAILED: No camera in scene.");
    }

    let format = scene.output_format;
    let format_ok = match input.kind {
        JobKind::Animation => !format.is_movie(),
        JobKind::Image => format.supports_averaging(),
    };
    if !format_ok {
        return ValidationResult::blocked(
            Severity::Warning,
            "RENDER FAILED: Output file format not supported. Supported formats: BMP, PNG, TARGA, JPEG, TIFF. (Animation only: JPEG 2000, IRIS, CINEON, HDR, DPX, OPEN_EXR, OPEN_EXR_MULTILAYER)",
        );
    }

    let sampled_image = input.kind == JobKind::Image && scene.engine.is_sampling();
    if sampled_image && jobs_per_frame(scene.max_samples, input.samples_per_job) > MAX_JOBS_PER_FRAME {
        return ValidationResult::blocked(
            Severity::Warning,
            "Max Samples / Samples Per Job > 100. Try increasing samples per job or lowering max samples.",
        );
    }

    if let Err(e) = fs::create_dir_all(input.result_dir) {
        tracing::debug!("Result dir probe failed: {}", e);
        return ValidationResult::blocked(
            Severity::Error,
            format!(
                "The folder '{}' could not be created on your local machine. Verify your input and write permissions or try another filepath.",
                input.result_dir.display()
            ),
        );
    }

    let mut result = ValidationResult::passed(format!(
        "Rendering {} on {} servers",
        input.kind.label(),
        input.server_count
    ));
    if sampled_image && input.samples_per_job < LOW_SAMPLE_ADVISORY {
        result.advisory = Some(format!(
            "RENDER ALERT: Render result may be inaccurate at {} samples. Try {} or more samples for a more accurate render.",
            input.samples_per_job, LOW_SAMPLE_ADVISORY
        ));
    }
    result
}

/// Remote sub-jobs needed to reach `max_samples` at `samples_per_job` each.
pub fn jobs_per_frame(max_samples: u32, samples_per_job: u32) -> u32 {
    max_samples / samples_per_job.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OutputFormat, RenderEngine};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn scene(project_file: &str) -> SceneState {
        SceneState {
            project_file: PathBuf::from(project_file),
            ..SceneState::default()
        }
    }

    fn input<'a>(
        kind: JobKind,
        project: &'a str,
        scene: &'a SceneState,
        result_dir: &'a Path,
    ) -> ValidationInput<'a> {
        ValidationInput {
            kind,
            project,
            scene,
            samples_per_job: 10,
            result_dir,
            server_count: 4,
        }
    }

    #[test]
    fn valid_job_reports_server_count() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("render-dump");
        let scene = scene("/work/shot.blend");

        let result = validate(&input(JobKind::Animation, "shot", &scene, &results));
        assert!(result.ok);
        assert_eq!(result.severity, Severity::Info);
        assert_eq!(result.message, "Rendering animation on 4 servers");
        assert!(results.is_dir());
    }

    #[test]
    fn unsaved_project_blocks_first() {
        let dir = tempdir().unwrap();
        let mut scene = scene("/it's/shot.blend");
        scene.has_camera = false;

        let result = validate(&input(JobKind::Image, "", &scene, dir.path()));
        assert!(!result.ok);
        assert_eq!(result.severity, Severity::Warning);
        assert!(result.message.contains("not saved"));
    }

    #[test]
    fn quote_in_path_outranks_missing_camera() {
        let dir = tempdir().unwrap();
        let mut scene = scene("/it's/shot.blend");
        scene.has_camera = false;

        let result = validate(&input(JobKind::Image, "shot", &scene, dir.path()));
        assert_eq!(result.severity, Severity::Error);
        assert!(result.message.contains("illegal quotation"));
    }

    #[test]
    fn missing_camera_is_warning() {
        let dir = tempdir().unwrap();
        let mut scene = scene("/work/shot.blend");
        scene.has_camera = false;

        let result = validate(&input(JobKind::Animation, "shot", &scene, dir.path()));
        assert!(!result.ok);
        assert_eq!(result.message, "RENDER FAILED: No camera in scene.");
    }

    #[test]
    fn movie_formats_are_rejected() {
        let dir = tempdir().unwrap();
        let mut scene = scene("/work/shot.blend");
        scene.output_format = OutputFormat::H264;

        let result = validate(&input(JobKind::Animation, "shot", &scene, dir.path()));
        assert!(!result.ok);
        assert_eq!(result.severity, Severity::Warning);

        scene.output_format = OutputFormat::OpenExr;
        assert!(validate(&input(JobKind::Animation, "shot", &scene, dir.path())).ok);
        assert!(!validate(&input(JobKind::Image, "shot", &scene, dir.path())).ok);
    }

    #[test]
    fn too_many_sub_jobs_blocks_image_jobs() {
        let dir = tempdir().unwrap();
        let mut scene = scene("/work/shot.blend");
        scene.max_samples = 1010;

        let result = validate(&input(JobKind::Image, "shot", &scene, dir.path()));
        assert!(!result.ok);
        assert!(result.message.starts_with("Max Samples"));

        // Animations and raster engines are not split into samples
        assert!(validate(&input(JobKind::Animation, "shot", &scene, dir.path())).ok);
        scene.engine = RenderEngine::Raster;
        assert!(validate(&input(JobKind::Image, "shot", &scene, dir.path())).ok);
    }

    #[test]
    fn uncreatable_result_dir_is_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let scene = scene("/work/shot.blend");
        let results = blocker.join("render-dump");

        let result = validate(&input(JobKind::Animation, "shot", &scene, &results));
        assert!(!result.ok);
        assert_eq!(result.severity, Severity::Error);
        assert!(result.message.contains("could not be created"));
    }

    #[test]
    fn low_samples_add_advisory_without_blocking() {
        let dir = tempdir().unwrap();
        let mut scene = scene("/work/shot.blend");
        scene.max_samples = 200;
        let mut request = input(JobKind::Image, "shot", &scene, dir.path());
        request.samples_per_job = 4;

        let result = validate(&request);
        assert!(result.ok);
        assert_eq!(result.message, "Rendering current frame on 4 servers");
        assert!(result.advisory.unwrap().contains("4 samples"));
    }

    #[test]
    fn jobs_per_frame_guards_zero() {
        assert_eq!(jobs_per_frame(1000, 10), 100);
        assert_eq!(jobs_per_frame(5, 0), 5);
    }
}
