//! Per-job logger with file and callback output.
//!
//! Each job gets its own logger that:
//! - Writes to a dedicated log file
//! - Sends messages to the host callback (if provided)
//! - Keeps remote output out of the log in compact mode
//! - Maintains a tail buffer of remote output for error reports

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};
use crate::models::Severity;

/// Per-job logger with dual output (file + host callback).
pub struct JobLogger {
    /// Job name for identification.
    job_name: String,
    /// Path to log file.
    log_path: PathBuf,
    /// File writer (buffered).
    file_writer: Arc<Mutex<Option<BufWriter<File>>>>,
    /// Host callback for sending messages.
    callback: Arc<Mutex<Option<LogCallback>>>,
    /// Logging configuration.
    config: LogConfig,
    /// Recent remote output lines.
    tail_buffer: Arc<Mutex<VecDeque<String>>>,
}

impl JobLogger {
    /// Create a new job logger.
    ///
    /// # Arguments
    /// * `job_name` - Name of the job (used in log filename)
    /// * `log_dir` - Directory to write log file to
    /// * `config` - Logging configuration
    /// * `callback` - Optional callback for host output
    pub fn new(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let job_name = job_name.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_name)));
        let file = File::create(&log_path)?;

        Ok(Self {
            job_name,
            log_path,
            file_writer: Arc::new(Mutex::new(Some(BufWriter::new(file)))),
            callback: Arc::new(Mutex::new(callback)),
            tail_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(config.error_tail))),
            config,
        })
    }

    /// Get the job name.
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Get the log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }

        let formatted = self.format_message(message);
        self.output(&formatted);
    }

    /// Log an info message.
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Log a debug message.
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Log a warning message.
    pub fn warn(&self, message: &str) {
        let msg = MessagePrefix::Warning.format(message);
        self.log(LogLevel::Warn, &msg);
    }

    /// Log an error message.
    pub fn error(&self, message: &str) {
        let msg = MessagePrefix::Error.format(message);
        self.log(LogLevel::Error, &msg);
    }

    /// Log a user-facing message with its severity.
    pub fn message(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => self.info(message),
            Severity::Warning => self.warn(message),
            Severity::Error => self.error(message),
        }
    }

    /// Log a command being executed.
    pub fn command(&self, command: &str) {
        let msg = MessagePrefix::Command.format(command);
        self.log(LogLevel::Info, &msg);
    }

    /// Log a pipeline stage marker.
    pub fn stage(&self, stage_name: &str) {
        let msg = MessagePrefix::Stage.format(stage_name);
        self.log(LogLevel::Info, &msg);
    }

    /// Log a success message.
    pub fn success(&self, message: &str) {
        let msg = MessagePrefix::Success.format(message);
        self.log(LogLevel::Info, &msg);
    }

    /// Log a validation message.
    pub fn validation(&self, message: &str) {
        let msg = MessagePrefix::Validation.format(message);
        self.log(LogLevel::Info, &msg);
    }

    /// Record a line of remote output.
    ///
    /// Always kept in the tail buffer; echoed only outside compact mode.
    pub fn remote_line(&self, line: &str) {
        {
            let mut buffer = self.tail_buffer.lock();
            if self.config.error_tail > 0 && buffer.len() >= self.config.error_tail {
                buffer.pop_front();
            }
            if self.config.error_tail > 0 {
                buffer.push_back(line.to_string());
            }
        }

        if self.config.compact {
            return;
        }

        let msg = MessagePrefix::Remote.format(line);
        self.output(&self.format_message(&msg));
    }

    /// Show the tail buffer (typically after an error).
    pub fn show_tail(&self, header: &str) {
        let buffer = self.tail_buffer.lock();
        if buffer.is_empty() {
            return;
        }

        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in buffer.iter() {
            self.output(&self.format_message(line));
        }
    }

    /// Clear the tail buffer.
    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    /// Get the current tail buffer contents.
    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release resources.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    /// Format a message with timestamp (if enabled).
    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    /// Output a formatted message to file and callback.
    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }

        if let Some(ref callback) = *self.callback.lock() {
            callback(formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn creates_log_file() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("shot_image_1", dir.path(), LogConfig::default(), None).unwrap();

        assert!(logger.log_path().exists());
        assert!(logger
            .log_path()
            .to_string_lossy()
            .contains("shot_image_1.log"));
    }

    #[test]
    fn writes_severity_prefixes_to_file() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("job", dir.path(), LogConfig::default(), None).unwrap();

        logger.message(Severity::Warning, "No render files found");
        logger.message(Severity::Error, "dispatcher gave return code 2");
        logger.stage("Fetch");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("[WARNING] No render files found"));
        assert!(content.contains("[ERROR] dispatcher gave return code 2"));
        assert!(content.contains("=== Fetch ==="));
    }

    #[test]
    fn calls_host_callback() {
        let dir = tempdir().unwrap();
        let call_count = Arc::new(AtomicUsize::new(0));
        let count_clone = call_count.clone();

        let callback: LogCallback = Box::new(move |_msg| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let logger = JobLogger::new("job", dir.path(), LogConfig::default(), Some(callback)).unwrap();

        logger.info("Message 1");
        logger.info("Message 2");
        logger.debug("filtered by level");

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn compact_mode_keeps_remote_output_in_tail_only() {
        let dir = tempdir().unwrap();
        let call_count = Arc::new(AtomicUsize::new(0));
        let count_clone = call_count.clone();
        let callback: LogCallback = Box::new(move |_msg| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let logger = JobLogger::new("job", dir.path(), LogConfig::default(), Some(callback)).unwrap();
        logger.remote_line("connecting to node1");

        assert_eq!(call_count.load(Ordering::SeqCst), 0);
        assert_eq!(logger.get_tail(), vec!["connecting to node1"]);
    }

    #[test]
    fn tail_buffer_maintains_limit() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            error_tail: 5,
            ..LogConfig::default()
        };

        let logger = JobLogger::new("job", dir.path(), config, None).unwrap();

        for i in 0..10 {
            logger.remote_line(&format!("Line {}", i));
        }

        let tail = logger.get_tail();
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0], "Line 5");
        assert_eq!(tail[4], "Line 9");
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("normal_name"), "normal_name");
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
    }
}
