//! Voice Activity Detection
//!
//! - [`ActivityDetector`]: pluggable speech/silence classifier
//! - [`EnergyVad`]: RMS-threshold reference detector
//! - Name-keyed registry (`register_vad` / `new_vad` / `list_vad`)
//! - [`VadProcessor`]: pipeline stage that turns detector edges into control frames

mod energy;
mod processor;
mod registry;

pub use energy::{pcm16_rms, EnergyVad, EnergyVadConfig, DEFAULT_ENERGY_THRESHOLD};
pub use processor::VadProcessor;
pub use registry::{list_vad, new_vad, register_vad, VadFactory};

use async_trait::async_trait;
use framevoice_config::VadSettings;
use framevoice_core::{CancellationToken, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Edge reported by a detector for one audio chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEvent {
    /// Speech began, or is ongoing
    SpeechStart,
    /// Speech just stopped
    SpeechEnd,
    /// Nothing is being said
    Silence,
}

impl ActivityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityEvent::SpeechStart => "speech_start",
            ActivityEvent::SpeechEnd => "speech_end",
            ActivityEvent::Silence => "silence",
        }
    }
}

/// Classification of one audio chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityResult {
    pub is_speech: bool,
    pub event_type: ActivityEvent,
    /// Detector confidence in [0, 1]
    pub confidence: f64,
}

impl ActivityResult {
    pub fn silence() -> Self {
        Self {
            is_speech: false,
            event_type: ActivityEvent::Silence,
            confidence: 0.0,
        }
    }
}

/// Speech/silence classifier
///
/// Called once per audio frame, in order. Implementations may keep state
/// across calls (edge detection) and must be safe to share between tasks.
#[async_trait]
pub trait ActivityDetector: Send + Sync + 'static {
    async fn detect_activity(&self, ctx: &CancellationToken, audio: &[u8]) -> Result<ActivityResult>;
}

/// Build the configured detector, or `None` when VAD is disabled
pub fn from_settings(settings: &VadSettings) -> Result<Option<Arc<dyn ActivityDetector>>> {
    if !settings.enabled {
        return Ok(None);
    }
    new_vad(&settings.provider, &settings.options).map(Some)
}
