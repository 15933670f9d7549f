//! Job submission surface.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::errors::{SubmitError, SubmitResult};
use super::registry::RenderStatusRegistry;
use super::runner::{JobHandle, JobRunner, SupportSync, SyncedGroup};
use crate::config::Settings;
use crate::frames::{self, FrameRangeError, FrameSet, RangeItem};
use crate::logging::{JobLogger, LogCallback, LogConfig};
use crate::models::{Job, JobKind, JobOptions, RenderStatus, SceneState};
use crate::remote::{GatewayConfig, RemoteSyncGateway, Spawner, SystemSpawner};
use crate::validation::{self, ValidationInput, ValidationResult};

/// A job that passed every check and has started.
pub struct SubmittedJob {
    pub handle: JobHandle,
    /// Drive with [`JobRunner::tick`] or [`JobRunner::run`].
    pub runner: JobRunner,
    /// Validation result, including any advisory.
    pub validation: ValidationResult,
}

/// Entry point for hosts: submits jobs and tracks shared state.
pub struct RenderFarm {
    settings: Settings,
    registry: RenderStatusRegistry,
    gateway: Arc<RemoteSyncGateway>,
    synced_group: SyncedGroup,
    next_id: AtomicU64,
}

impl RenderFarm {
    pub fn new(settings: Settings, spawner: Arc<dyn Spawner>) -> Self {
        let gateway = RemoteSyncGateway::new(GatewayConfig::from(&settings), spawner);
        Self {
            settings,
            registry: RenderStatusRegistry::new(),
            gateway: Arc::new(gateway),
            synced_group: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Farm that runs real `rsync` and `ssh` processes.
    pub fn with_system_spawner(settings: Settings) -> Self {
        Self::new(settings, Arc::new(SystemSpawner))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &RenderStatusRegistry {
        &self.registry
    }

    /// Interval between scheduler ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.settings.render.tick_interval_ms)
    }

    /// Validate a request and start its first remote operation.
    ///
    /// An empty `frame_range` means the scene's frame range for animations
    /// and the current frame for image jobs. `callback` receives every line
    /// written to the job log.
    pub fn submit(
        &self,
        kind: JobKind,
        frame_range: &str,
        scene: &SceneState,
        options: &JobOptions,
        callback: Option<LogCallback>,
    ) -> SubmitResult<SubmittedJob> {
        if self.registry.is_busy() {
            return Err(SubmitError::Busy);
        }
        let hosts = self.settings.servers.active_hosts();
        if hosts.is_empty() {
            return Err(SubmitError::NoServers);
        }
        if self.settings.remote.host_login.trim().is_empty() {
            return Err(SubmitError::not_configured(
                "No host server login configured. Set [remote] host_login in the settings file.",
            ));
        }

        let render = &self.settings.render;
        let samples_per_job = options.samples_per_job.unwrap_or(render.samples_per_job).max(1);
        let project = scene.project_identifier();
        let result_dir = scene.project_dir().join(&self.settings.paths.result_dir_name);

        let validation = validation::validate(&ValidationInput {
            kind,
            project: &project,
            scene,
            samples_per_job,
            result_dir: &result_dir,
            server_count: hosts.len(),
        });
        if !validation.ok {
            return Err(SubmitError::Invalid(validation));
        }

        let frame_set = match resolve_frames(kind, frame_range, scene) {
            Ok(set) => set,
            Err(e) => {
                self.registry.set(kind, RenderStatus::Error);
                return Err(e);
            }
        };

        let default_prefix = if render.output_prefix.is_empty() {
            project.clone()
        } else {
            render.output_prefix.clone()
        };
        let output_prefix = options
            .output_prefix
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or(default_prefix);
        let jobs_per_frame = match kind {
            JobKind::Image if scene.engine.is_sampling() => {
                validation::jobs_per_frame(scene.max_samples, samples_per_job).max(1)
            }
            _ => 1,
        };

        let job = Job {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            kind,
            custom_prefix: output_prefix != project,
            project,
            project_file: scene.project_file.clone(),
            frames: frame_set,
            output_prefix,
            extension: scene.output_format.extension().to_string(),
            compress: options.compress.unwrap_or(render.compress),
            samples_per_job,
            jobs_per_frame,
            max_server_load: options.max_server_load.unwrap_or(render.max_server_load),
            timeout_secs: options.timeout_secs.unwrap_or(render.timeout_secs),
            result_dir,
        };

        let logger = JobLogger::new(
            job.display_name(),
            PathBuf::from(&self.settings.paths.logs_folder),
            LogConfig::from(&self.settings.logging),
            callback,
        )
        .map_err(|e| SubmitError::io("creating job log", e))?;

        if !self.registry.begin(kind) {
            return Err(SubmitError::Busy);
        }

        logger.validation(&validation.message);
        if let Some(advisory) = &validation.advisory {
            logger.warn(advisory);
        }
        logger.info(&format!(
            "Frames {} on {} ({} per frame, max load {})",
            frames::render(&job.frames),
            self.settings.servers.active_group,
            job.jobs_per_frame,
            job.max_server_load
        ));

        let group = self.settings.servers.active_group.clone();
        let sync_support = self.synced_group.lock().as_deref() != Some(group.as_str());
        let (sender, receiver) = mpsc::channel();
        let handle = JobHandle::new(job.id, kind, sender);

        let mut runner = JobRunner::new(
            job,
            sync_support,
            Arc::clone(&self.gateway),
            self.registry.clone(),
            Arc::new(logger),
            SupportSync {
                group,
                hosts,
                synced: Arc::clone(&self.synced_group),
            },
            receiver,
        );
        runner.start();

        Ok(SubmittedJob {
            handle,
            runner,
            validation,
        })
    }

    /// Ask a job to cancel.
    pub fn cancel(&self, handle: &JobHandle) -> bool {
        handle.cancel()
    }

    /// Ask a job for a status probe.
    pub fn request_status_probe(&self, handle: &JobHandle) -> bool {
        handle.request_status_probe()
    }
}

/// Frames a request covers, with defaults taken from the scene.
fn resolve_frames(kind: JobKind, text: &str, scene: &SceneState) -> SubmitResult<FrameSet> {
    let items = if text.trim().is_empty() {
        match kind {
            JobKind::Image => vec![RangeItem::Single(scene.frame_current)],
            JobKind::Animation => vec![RangeItem::span(scene.frame_start, scene.frame_end)
                .map_err(SubmitError::InvalidRange)?],
        }
    } else {
        frames::parse_items(text).map_err(SubmitError::InvalidRange)?
    };

    frames::check_items_size(&items).map_err(SubmitError::RangeTooLarge)?;
    let set = frames::expand(&items);

    // Image jobs average samples of a single frame
    if kind == JobKind::Image && set.len() != 1 {
        return Err(SubmitError::InvalidRange(FrameRangeError::invalid_token(
            text.trim(),
        )));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> SceneState {
        SceneState {
            project_file: PathBuf::from("/work/shot.blend"),
            frame_current: 12,
            frame_start: 1,
            frame_end: 24,
            ..SceneState::default()
        }
    }

    #[test]
    fn empty_range_uses_scene_defaults() {
        crate::logging::init_test_tracing();
        let scene = scene();
        assert_eq!(
            resolve_frames(JobKind::Animation, "  ", &scene).unwrap(),
            FrameSet::span(1, 24).unwrap()
        );
        assert_eq!(
            resolve_frames(JobKind::Image, "", &scene).unwrap(),
            FrameSet::single(12)
        );
    }

    #[test]
    fn explicit_range_is_parsed() {
        let frames = resolve_frames(JobKind::Animation, "1-3, 9", &scene()).unwrap();
        assert_eq!(frames, FrameSet::from(vec![1, 2, 3, 9]));
    }

    #[test]
    fn bad_ranges_are_rejected() {
        assert!(matches!(
            resolve_frames(JobKind::Animation, "5-1", &scene()),
            Err(SubmitError::InvalidRange(_))
        ));
        assert!(matches!(
            resolve_frames(JobKind::Image, "1-2", &scene()),
            Err(SubmitError::InvalidRange(_))
        ));
    }

    #[test]
    fn huge_ranges_are_rejected() {
        assert!(matches!(
            resolve_frames(JobKind::Animation, "0-99999", &scene()),
            Err(SubmitError::RangeTooLarge(_))
        ));
        assert!(matches!(
            resolve_frames(JobKind::Animation, "0-4294967295", &scene()),
            Err(SubmitError::RangeTooLarge(_))
        ));

        let mut wide = scene();
        wide.frame_end = u32::MAX;
        assert!(matches!(
            resolve_frames(JobKind::Animation, "", &wide),
            Err(SubmitError::RangeTooLarge(_))
        ));
    }
}
