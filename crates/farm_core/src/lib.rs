//! Render farm client core.
//!
//! Submits render jobs for a scene to a pool of remote servers, tracks their
//! progress and gathers the results. The crate has no UI dependencies; a
//! host (the `render-farm` CLI, or an editor add-on) drives it.

pub mod aggregate;
pub mod config;
pub mod frames;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod remote;
pub mod validation;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
