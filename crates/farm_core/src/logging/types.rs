//! Logging types and configuration.

use serde::{Deserialize, Serialize};

use crate::config::LoggingSettings;
use crate::models::Severity;

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace-level debugging (very verbose).
    Trace,
    /// Debug information.
    Debug,
    /// General information.
    #[default]
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

impl LogLevel {
    /// Convert to tracing level.
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl From<Severity> for LogLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => LogLevel::Info,
            Severity::Warning => LogLevel::Warn,
            Severity::Error => LogLevel::Error,
        }
    }
}

/// Configuration for logging behavior.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to output.
    pub level: LogLevel,
    /// Compact mode: remote output only goes to the tail buffer.
    pub compact: bool,
    /// Number of remote output lines kept for error reports.
    pub error_tail: usize,
    /// Show timestamps in log output.
    pub show_timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            compact: true,
            error_tail: 20,
            show_timestamps: true,
        }
    }
}

impl LogConfig {
    /// Create a debug configuration (verbose, no compact).
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
            compact: false,
            error_tail: 50,
            show_timestamps: true,
        }
    }
}

impl From<&LoggingSettings> for LogConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            level: LogLevel::Info,
            compact: settings.compact,
            error_tail: settings.error_tail as usize,
            show_timestamps: settings.show_timestamps,
        }
    }
}

/// Callback receiving each formatted log line (the host's progress surface).
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Message prefix types for consistent formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
    /// Shell command: `$ command`
    Command,
    /// Stage marker: `=== Stage ===`
    Stage,
    /// Validation: `[Validation]`
    Validation,
    /// Success: `[SUCCESS]`
    Success,
    /// Warning: `[WARNING]`
    Warning,
    /// Error: `[ERROR]`
    Error,
    /// Remote stderr: `[remote]`
    Remote,
    /// No prefix
    None,
}

impl MessagePrefix {
    /// Format a message with this prefix.
    pub fn format(&self, message: &str) -> String {
        match self {
            MessagePrefix::Command => format!("$ {}", message),
            MessagePrefix::Stage => format!("=== {} ===", message),
            MessagePrefix::Validation => format!("[Validation] {}", message),
            MessagePrefix::Success => format!("[SUCCESS] {}", message),
            MessagePrefix::Warning => format!("[WARNING] {}", message),
            MessagePrefix::Error => format!("[ERROR] {}", message),
            MessagePrefix::Remote => format!("[remote] {}", message),
            MessagePrefix::None => message.to_string(),
        }
    }
}
