//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// Prefix of environment variable overrides (`FRAMEVOICE__VAD__PROVIDER=energy`)
pub const ENV_PREFIX: &str = "FRAMEVOICE";

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Frame pipeline wiring
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Voice activity detection
    #[serde(default)]
    pub vad: VadSettings,

    /// S2S / cascade switching
    #[serde(default)]
    pub hybrid: HybridSettings,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_pipeline()?;
        self.validate_vad()?;
        self.validate_hybrid()?;
        Ok(())
    }

    fn validate_pipeline(&self) -> Result<(), ConfigError> {
        if self.pipeline.channel_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.channel_buffer_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    fn validate_vad(&self) -> Result<(), ConfigError> {
        if self.vad.enabled && self.vad.provider.trim().is_empty() {
            return Err(ConfigError::MissingField("vad.provider".to_string()));
        }
        if !self.vad.options.is_object() {
            return Err(ConfigError::InvalidValue {
                field: "vad.options".to_string(),
                message: "must be a table of provider options".to_string(),
            });
        }
        Ok(())
    }

    fn validate_hybrid(&self) -> Result<(), ConfigError> {
        if self.hybrid.tool_call_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "hybrid.tool_call_threshold".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Pipeline wiring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Capacity of the channels connecting stages
    #[serde(default = "default_channel_buffer_size")]
    pub channel_buffer_size: usize,
}

fn default_channel_buffer_size() -> usize {
    64
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            channel_buffer_size: default_channel_buffer_size(),
        }
    }
}

/// Voice activity detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadSettings {
    /// Registered provider name
    #[serde(default = "default_vad_provider")]
    pub provider: String,

    /// Insert the VAD stage into the pipeline
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Provider-specific options, e.g. `{ threshold = 2000.0 }`
    #[serde(default = "default_vad_options")]
    pub options: serde_json::Value,
}

fn default_vad_provider() -> String {
    "energy".to_string()
}

fn default_vad_options() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_true() -> bool {
    true
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            provider: default_vad_provider(),
            enabled: true,
            options: default_vad_options(),
        }
    }
}

/// Mode a hybrid pipeline starts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InitialMode {
    #[default]
    S2s,
    Cascade,
}

/// Hybrid pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridSettings {
    /// Tool calls after which the default policy leaves S2S
    #[serde(default = "default_tool_call_threshold")]
    pub tool_call_threshold: u32,

    #[serde(default)]
    pub initial_mode: InitialMode,
}

fn default_tool_call_threshold() -> u32 {
    3
}

impl Default for HybridSettings {
    fn default() -> Self {
        Self {
            tool_call_threshold: default_tool_call_threshold(),
            initial_mode: InitialMode::default(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Load settings from `config/` in the working directory
///
/// Priority: env vars > config/{env}.* > config/default.* > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from an explicit config directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    // Load default config
    builder = builder.add_source(File::from(dir.join("default")).required(false));

    // Load environment-specific config
    if let Some(env_name) = env {
        builder = builder.add_source(File::from(dir.join(env_name)).required(false));
    }

    // Load from environment variables
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
