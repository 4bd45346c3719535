//! Configuration management for the voice pipeline
//!
//! Supports loading configuration from:
//! - TOML/YAML/JSON files under `config/`
//! - Environment variables (FRAMEVOICE__ prefix)
//!
//! and installing the tracing subscriber described by the loaded settings.

pub mod settings;
pub mod telemetry;

pub use settings::{
    load_settings, load_settings_from, HybridSettings, InitialMode, ObservabilitySettings,
    PipelineSettings, Settings, VadSettings, ENV_PREFIX,
};
pub use telemetry::{env_filter, init_tracing};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Tracing setup failed: {0}")]
    Tracing(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
