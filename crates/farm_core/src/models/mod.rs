//! Data models shared across the client.

mod enums;
mod job;

pub use enums::{JobKind, OutputFormat, RenderEngine, RenderStatus, Severity};
pub use job::{sanitize_project_name, Job, JobOptions, SceneState};
