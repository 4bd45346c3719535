//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{ConfigError, ObservabilitySettings};

/// Crate targets the configured level applies to
const LOG_TARGETS: [&str; 3] = ["framevoice_core", "framevoice_config", "framevoice_pipeline"];

/// Build the log filter: `RUST_LOG` wins, otherwise the configured level
pub fn env_filter(config: &ObservabilitySettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)))
}

fn default_directives(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install a global subscriber with a plain or JSON fmt layer
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: &ObservabilitySettings) -> Result<(), ConfigError> {
    let subscriber = tracing_subscriber::registry().with(env_filter(config));
    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    subscriber
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ConfigError::Tracing(e.to_string()))
}
