//! Error types for the voice pipeline

use std::sync::Arc;
use thiserror::Error;

use crate::conversation::SessionState;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Transport operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    Recv,
    Send,
    Close,
}

impl TransportOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportOp::Recv => "recv",
            TransportOp::Send => "send",
            TransportOp::Close => "close",
        }
    }
}

impl std::fmt::Display for TransportOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the voice pipeline
///
/// Cloneable so that error hooks can inspect an error and hand it back
/// unchanged when they decide not to suppress it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Missing or inconsistent configuration, raised before any task starts
    #[error("voice: {0}")]
    Config(String),

    /// Transport I/O failure
    #[error("voice: transport {op}: {source}")]
    Transport {
        op: TransportOp,
        #[source]
        source: Arc<Error>,
    },

    /// Activity detector failure
    #[error("voice: vad: {0}")]
    Vad(String),

    /// Registry lookup for an unregistered provider
    #[error("voice: {kind}: unknown provider {name:?} (registered: {registered:?})")]
    UnknownProvider {
        kind: &'static str,
        name: String,
        registered: Vec<String>,
    },

    /// A pipeline stage failed
    #[error("voice: processor {stage}: {message}")]
    Processor { stage: String, message: String },

    /// A spawned stage task panicked or was aborted
    #[error("voice: processor task failed: {0}")]
    TaskPanicked(String),

    /// Rejected session state transition
    #[error("voice: invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    /// Cooperative cancellation was requested
    #[error("voice: context canceled")]
    Cancelled,

    /// The peer of a channel went away
    #[error("voice: channel closed")]
    ChannelClosed,

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Error::Other(message.into())
    }

    pub fn processor(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Processor {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Wrap a transport implementation error with the failing operation
    pub fn transport(op: TransportOp, source: Error) -> Self {
        Error::Transport {
            op,
            source: Arc::new(source),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Inner error of a wrapped transport failure
    pub fn transport_source(&self) -> Option<&Error> {
        match self {
            Error::Transport { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(format!("invalid configuration: {}", err))
    }
}
