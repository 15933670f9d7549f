//! Configuration management for the render farm client.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use farm_core::config::{ConfigManager, ConfigSection};
//!
//! // Create manager and load (or create default) config
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! // Read settings
//! println!("Remote host: {}", config.settings().remote.host_login);
//!
//! // Modify a setting
//! config.settings_mut().render.samples_per_job = 25;
//!
//! // Save just the render section atomically
//! config.update_section(ConfigSection::Render).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, LoggingSettings, PathSettings, RemoteSettings, RenderSettings, ServerSettings,
    Settings, ALL_SERVERS, MAX_SERVER_LOAD_RANGE,
};
