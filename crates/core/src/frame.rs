//! Frames: the unit of data flowing through the pipeline
//!
//! A frame is a typed envelope around raw bytes plus a string-keyed metadata
//! map. Processors never mutate a frame they did not create; they either
//! forward it or build a new one.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Metadata key carrying the control signal name
pub const META_SIGNAL: &str = "signal";
/// Metadata key carrying the audio sample rate in Hz
pub const META_SAMPLE_RATE: &str = "sample_rate";
/// Metadata key carrying the MIME type of an image frame
pub const META_CONTENT_TYPE: &str = "content_type";

/// Speech has started (emitted by VAD)
pub const SIGNAL_START: &str = "start";
/// Stop the current activity
pub const SIGNAL_STOP: &str = "stop";
/// User barged in over agent output
pub const SIGNAL_INTERRUPT: &str = "interrupt";
/// The user finished an utterance (emitted by VAD)
pub const SIGNAL_END_OF_UTTERANCE: &str = "end_of_utterance";

/// Kind of payload a frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// PCM audio bytes
    Audio,
    /// UTF-8 text
    Text,
    /// Control signal, name in metadata
    Control,
    /// Encoded image bytes
    Image,
}

impl FrameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameType::Audio => "audio",
            FrameType::Text => "text",
            FrameType::Control => "control",
            FrameType::Image => "image",
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data envelope that flows between processors
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Payload kind
    pub kind: FrameType,
    /// Raw payload; meaning depends on `kind`
    pub data: Bytes,
    /// Arbitrary typed attributes (sample rate, signal name, content type, ...)
    pub metadata: HashMap<String, Value>,
}

impl Frame {
    /// Create a frame with empty metadata
    pub fn new(kind: FrameType, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: data.into(),
            metadata: HashMap::new(),
        }
    }

    /// Audio frame with its sample rate recorded in metadata
    pub fn audio(data: impl Into<Bytes>, sample_rate: u32) -> Self {
        Self::new(FrameType::Audio, data).with_metadata(META_SAMPLE_RATE, sample_rate)
    }

    /// Text frame holding UTF-8 bytes
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(FrameType::Text, Bytes::from(text.into()))
    }

    /// Control frame with no payload and the signal name in metadata
    pub fn control(signal: impl Into<String>) -> Self {
        Self::new(FrameType::Control, Bytes::new()).with_metadata(META_SIGNAL, signal.into())
    }

    /// Image frame tagged with its content type
    pub fn image(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self::new(FrameType::Image, data).with_metadata(META_CONTENT_TYPE, content_type.into())
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Control signal name, or `""` for non-control frames
    pub fn signal(&self) -> &str {
        if self.kind != FrameType::Control {
            return "";
        }
        self.metadata
            .get(META_SIGNAL)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Payload of a text frame decoded as UTF-8
    ///
    /// `""` for every other frame type and for invalid UTF-8.
    pub fn text_content(&self) -> &str {
        if self.kind != FrameType::Text {
            return "";
        }
        std::str::from_utf8(&self.data).unwrap_or("")
    }

    /// Sample rate of an audio frame, if recorded
    pub fn sample_rate(&self) -> Option<u32> {
        self.metadata
            .get(META_SAMPLE_RATE)
            .and_then(Value::as_u64)
            .and_then(|rate| u32::try_from(rate).ok())
    }

    /// Content type of an image frame, if recorded
    pub fn content_type(&self) -> Option<&str> {
        self.metadata.get(META_CONTENT_TYPE).and_then(Value::as_str)
    }

    pub fn is_audio(&self) -> bool {
        self.kind == FrameType::Audio
    }

    pub fn is_text(&self) -> bool {
        self.kind == FrameType::Text
    }

    pub fn is_control(&self) -> bool {
        self.kind == FrameType::Control
    }

    pub fn is_image(&self) -> bool {
        self.kind == FrameType::Image
    }
}
