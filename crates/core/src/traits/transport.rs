//! Audio transport interface

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{Frame, FrameReceiver, Result};

/// Bidirectional frame transport (WebRTC, telephony, WebSocket, ...)
///
/// `recv` is called once per pipeline run and hands over the inbound frame
/// channel; the transport closes it when the remote side stops sending.
/// `send` is called once per outbound frame.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Obtain the inbound frame channel
    async fn recv(&self, ctx: CancellationToken) -> Result<FrameReceiver>;

    /// Deliver one outbound frame
    async fn send(&self, ctx: &CancellationToken, frame: Frame) -> Result<()>;

    /// Release the underlying connection
    async fn close(&self) -> Result<()>;
}
