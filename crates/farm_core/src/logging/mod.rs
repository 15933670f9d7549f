//! Logging infrastructure for the render farm client.
//!
//! This module provides:
//! - Per-job loggers with file + host callback dual output
//! - Compact mode that keeps remote output out of the job log
//! - Tail buffer of remote output for error reports
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```no_run
//! use farm_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("shot_animation_1", "/path/to/logs", LogConfig::default(), None)
//!     .unwrap();
//!
//! logger.stage("Sync project");
//! logger.command("rsync -a shot.blend render@farm:/tmp/render-farm/shot/toRemote/");
//! logger.remote_line("node3: frame 12 failed");
//! logger.success("Render completed for 24/25 frames");
//! ```

mod job_logger;
mod types;

use std::path::Path;

pub use job_logger::JobLogger;
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

/// Initialize tracing with stderr output plus a daily rolling file in `log_dir`.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the program. If the directory cannot be created, only the
/// stderr layer is installed and `None` is returned.
pub fn init_tracing_with_file(default_level: LogLevel, log_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    if let Err(e) = std::fs::create_dir_all(log_dir) {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
        tracing::warn!("Cannot create log directory {}: {}", log_dir.display(), e);
        return None;
    }

    let appender = tracing_appender::rolling::daily(log_dir, "render-farm.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .init();

    Some(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

/// Convert LogLevel to filter string.
fn level_to_filter_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_to_filter_works() {
        assert_eq!(level_to_filter_str(LogLevel::Debug), "debug");
        assert_eq!(level_to_filter_str(LogLevel::Info), "info");
    }
}
