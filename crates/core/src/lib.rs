//! Core traits and types for the voice pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - Frame data model and control signals
//! - FrameProcessor / FrameHandler / Transport traits
//! - Conversation state (VoiceSession, Turn)
//! - Observer hooks
//! - Error types

pub mod conversation;
pub mod error;
pub mod frame;
pub mod hooks;
pub mod traits;

pub use conversation::{SessionState, Turn, VoiceSession};
pub use error::{Error, Result, TransportOp};
pub use frame::{
    Frame, FrameType, META_CONTENT_TYPE, META_SAMPLE_RATE, META_SIGNAL, SIGNAL_END_OF_UTTERANCE,
    SIGNAL_INTERRUPT, SIGNAL_START, SIGNAL_STOP,
};
pub use hooks::{compose_hooks, ErrorHook, Hooks, SignalHook, TextHook};

// Trait re-exports
pub use traits::{
    emit, frame_loop, processor_fn, recv_frame, FrameHandler, FrameLoop, FrameProcessor,
    FrameReceiver, FrameSender, ProcessorFn, Transport, DEFAULT_CHANNEL_CAPACITY,
};

// Cancellation handle threaded through every processor
pub use tokio_util::sync::CancellationToken;
