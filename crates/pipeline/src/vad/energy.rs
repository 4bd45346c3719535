//! Energy-based Voice Activity Detector
//!
//! Classifies 16-bit little-endian PCM by its RMS amplitude against a fixed
//! threshold, with a two-state edge detector carried across calls.

use async_trait::async_trait;
use framevoice_core::{CancellationToken, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{ActivityDetector, ActivityEvent, ActivityResult};

/// Threshold used when the configured one is zero
pub const DEFAULT_ENERGY_THRESHOLD: f64 = 1000.0;

/// Energy VAD configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyVadConfig {
    /// RMS amplitude at or above which a chunk is speech; 0 means default
    pub threshold: f64,
}

/// RMS-threshold detector
#[derive(Debug)]
pub struct EnergyVad {
    threshold: f64,
    was_speaking: Mutex<bool>,
}

impl EnergyVad {
    pub fn new(config: EnergyVadConfig) -> Self {
        let threshold = if config.threshold == 0.0 {
            DEFAULT_ENERGY_THRESHOLD
        } else {
            config.threshold
        };
        Self {
            threshold,
            was_speaking: Mutex::new(false),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Forget any speech in progress
    pub fn reset(&self) {
        *self.was_speaking.lock() = false;
    }

    /// Classify one chunk and advance the edge state
    pub fn classify(&self, audio: &[u8]) -> ActivityResult {
        let Some(rms) = pcm16_rms(audio) else {
            return ActivityResult::silence();
        };

        let is_speech = rms >= self.threshold;
        let confidence = (rms / (2.0 * self.threshold)).clamp(0.0, 1.0);

        let mut was_speaking = self.was_speaking.lock();
        // Ongoing speech reports SpeechStart again
        let event_type = match (*was_speaking, is_speech) {
            (_, true) => ActivityEvent::SpeechStart,
            (true, false) => ActivityEvent::SpeechEnd,
            (false, false) => ActivityEvent::Silence,
        };
        *was_speaking = is_speech;

        ActivityResult {
            is_speech,
            event_type,
            confidence,
        }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(EnergyVadConfig::default())
    }
}

#[async_trait]
impl ActivityDetector for EnergyVad {
    async fn detect_activity(&self, _ctx: &CancellationToken, audio: &[u8]) -> Result<ActivityResult> {
        Ok(self.classify(audio))
    }
}

/// RMS of 16-bit little-endian PCM, `None` when there is not a single sample
///
/// A trailing odd byte is ignored.
pub fn pcm16_rms(audio: &[u8]) -> Option<f64> {
    let samples = audio.len() / 2;
    if samples == 0 {
        return None;
    }
    let sum_sq: f64 = audio
        .chunks_exact(2)
        .map(|b| {
            let s = i16::from_le_bytes([b[0], b[1]]) as f64;
            s * s
        })
        .sum();
    Some((sum_sq / samples as f64).sqrt())
}
