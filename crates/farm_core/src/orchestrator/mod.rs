//! Job orchestration for the render farm.
//!
//! A submitted job runs as a pure state machine ([`JobMachine`]) driven by a
//! non-blocking scheduler ([`JobRunner`]). The primary track walks the
//! pipeline stages in order; a secondary track may fetch partial results
//! while the render is still running.
//!
//! # Architecture
//!
//! ```text
//! RenderFarm::submit
//!     │  validate, resolve frames, claim registry
//!     ▼
//! JobRunner (ticks)
//!     ├── Stage 1: Sync support files   (skipped when already synced)
//!     ├── Stage 2: Sync project
//!     ├── Stage 3: Dispatch render      ── probe ──► Fetch (secondary track)
//!     ├── Stage 4: Fetch results
//!     └── Stage 5: Aggregate
//! ```
//!
//! # Example
//!
//! ```no_run
//! use farm_core::config::Settings;
//! use farm_core::models::{JobKind, JobOptions, SceneState};
//! use farm_core::orchestrator::RenderFarm;
//!
//! let farm = RenderFarm::with_system_spawner(Settings::default());
//! let scene = SceneState::default();
//! let mut job = farm
//!     .submit(JobKind::Animation, "1-24", &scene, &JobOptions::default(), None)
//!     .unwrap();
//!
//! let outcome = job.runner.run(farm.tick_interval());
//! println!("{}", outcome.summary);
//! ```

mod errors;
mod exit;
mod machine;
mod registry;
mod runner;
mod service;
mod types;

pub use errors::{SubmitError, SubmitResult};
pub use exit::{classify, parse_failed_frames, ExitClass, FailureKind};
pub use machine::JobMachine;
pub use registry::{RegistrySnapshot, RenderStatusRegistry};
pub use runner::{JobHandle, JobRunner};
pub use service::{RenderFarm, SubmittedJob};
pub use types::{
    Effect, Event, Failure, JobCommand, JobOutcome, Message, Operation, Outcome, PipelineState,
    Stage, TrackId,
};
