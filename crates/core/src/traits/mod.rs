//! Core traits for the voice pipeline
//!
//! ```text
//! Pipeline:
//!   - FrameProcessor: one concurrently running stage (channel in, channel out)
//!   - FrameHandler: per-frame logic driven by frame_loop
//!
//! I/O:
//!   - Transport: inbound frame channel + outbound frame sink
//! ```

mod pipeline;
mod transport;

pub use pipeline::{
    emit, frame_loop, processor_fn, recv_frame, FrameHandler, FrameLoop, FrameProcessor,
    FrameReceiver, FrameSender, ProcessorFn, DEFAULT_CHANNEL_CAPACITY,
};
pub use transport::Transport;
