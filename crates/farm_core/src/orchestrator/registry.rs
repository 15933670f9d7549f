//! Process-wide render status, shared by every job and the host.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::models::{JobKind, RenderStatus};

#[derive(Debug, Default)]
struct RegistryState {
    image: RenderStatus,
    animation: RenderStatus,
    viewable: BTreeSet<JobKind>,
}

impl RegistryState {
    fn slot(&mut self, kind: JobKind) -> &mut RenderStatus {
        match kind {
            JobKind::Image => &mut self.image,
            JobKind::Animation => &mut self.animation,
        }
    }

    fn status(&self, kind: JobKind) -> RenderStatus {
        match kind {
            JobKind::Image => self.image,
            JobKind::Animation => self.animation,
        }
    }

    fn any_running(&self) -> bool {
        self.image.is_running() || self.animation.is_running()
    }
}

/// Point-in-time copy of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    pub image: RenderStatus,
    pub animation: RenderStatus,
    /// Result kinds the host can open.
    pub viewable: Vec<JobKind>,
}

/// Current status of the image job and the animation job.
///
/// Cheap to clone; all clones share the same state. Writes are
/// last-writer-wins.
#[derive(Debug, Clone, Default)]
pub struct RenderStatusRegistry {
    inner: Arc<RwLock<RegistryState>>,
}

impl RenderStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: JobKind) -> RenderStatus {
        self.inner.read().status(kind)
    }

    pub fn set(&self, kind: JobKind, status: RenderStatus) {
        tracing::debug!("{} status -> {}", kind, status);
        *self.inner.write().slot(kind) = status;
    }

    /// Whether a job of either kind is still running.
    pub fn is_busy(&self) -> bool {
        self.inner.read().any_running()
    }

    /// Claim the registry for a new job of `kind`.
    ///
    /// Fails when any job is running. Otherwise the kind becomes
    /// `Preparing files...` and the other kind is reset to `None`.
    pub fn begin(&self, kind: JobKind) -> bool {
        let mut state = self.inner.write();
        if state.any_running() {
            return false;
        }
        *state.slot(kind) = RenderStatus::Preparing;
        *state.slot(kind.other()) = RenderStatus::None;
        true
    }

    /// Record that results of `kind` can be opened.
    ///
    /// A new averaged image supersedes any animation results on display.
    pub fn mark_viewable(&self, kind: JobKind) {
        let mut state = self.inner.write();
        state.viewable.insert(kind);
        if kind == JobKind::Image {
            state.viewable.remove(&JobKind::Animation);
        }
    }

    pub fn is_viewable(&self, kind: JobKind) -> bool {
        self.inner.read().viewable.contains(&kind)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.inner.read();
        RegistrySnapshot {
            image: state.image,
            animation: state.animation,
            viewable: state.viewable.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_resets_the_other_kind() {
        let registry = RenderStatusRegistry::new();
        registry.set(JobKind::Image, RenderStatus::Complete);

        assert!(registry.begin(JobKind::Animation));
        assert_eq!(registry.get(JobKind::Animation), RenderStatus::Preparing);
        assert_eq!(registry.get(JobKind::Image), RenderStatus::None);
    }

    #[test]
    fn running_job_blocks_both_kinds() {
        let registry = RenderStatusRegistry::new();
        assert!(registry.begin(JobKind::Image));
        registry.set(JobKind::Image, RenderStatus::Rendering);

        assert!(registry.is_busy());
        assert!(!registry.begin(JobKind::Image));
        assert!(!registry.begin(JobKind::Animation));
        assert_eq!(registry.get(JobKind::Image), RenderStatus::Rendering);

        registry.set(JobKind::Image, RenderStatus::Error);
        assert!(!registry.is_busy());
        assert!(registry.begin(JobKind::Animation));
    }

    #[test]
    fn clones_share_state() {
        let registry = RenderStatusRegistry::new();
        let other = registry.clone();
        other.set(JobKind::Animation, RenderStatus::Finishing);
        assert_eq!(registry.get(JobKind::Animation), RenderStatus::Finishing);
    }

    #[test]
    fn image_results_replace_animation_results() {
        let registry = RenderStatusRegistry::new();
        registry.mark_viewable(JobKind::Animation);
        assert!(registry.is_viewable(JobKind::Animation));

        registry.mark_viewable(JobKind::Image);
        assert!(registry.is_viewable(JobKind::Image));
        assert!(!registry.is_viewable(JobKind::Animation));
        assert_eq!(registry.snapshot().viewable, vec![JobKind::Image]);
    }
}
