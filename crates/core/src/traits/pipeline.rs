//! Pipeline processing traits
//!
//! A [`FrameProcessor`] is one stage of the pipeline: it consumes an input
//! channel and produces an output channel, running in its own tokio task.
//! Per-frame logic that does not need to own the loop implements
//! [`FrameHandler`] instead and is driven by [`frame_loop`] / [`FrameLoop`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{Error, Frame, Result};

/// Sending half of a frame channel
pub type FrameSender = mpsc::Sender<Frame>;
/// Receiving half of a frame channel
pub type FrameReceiver = mpsc::Receiver<Frame>;

/// Default capacity of the channels that connect stages
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Frame processor for pipeline stages
///
/// Contract:
/// - `output` is owned by the call and dropped on every return path, which
///   closes the channel so the downstream stage ends its own read loop.
/// - When `ctx` is cancelled the processor stops reading `input` and returns
///   [`Error::Cancelled`] promptly.
/// - Returning `Ok(())` signals graceful completion; any error is fatal for
///   the chain it runs in.
///
/// # Example Implementation
///
/// ```ignore
/// struct Upper;
///
/// #[async_trait]
/// impl FrameProcessor for Upper {
///     async fn process(
///         &self,
///         ctx: CancellationToken,
///         mut input: FrameReceiver,
///         output: FrameSender,
///     ) -> Result<()> {
///         while let Some(frame) = recv_frame(&ctx, &mut input).await? {
///             let text = frame.text_content().to_uppercase();
///             emit(&ctx, &output, Frame::text(text)).await?;
///         }
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "upper"
///     }
/// }
/// ```
#[async_trait]
pub trait FrameProcessor: Send + Sync + 'static {
    /// Run the stage until `input` closes, `ctx` is cancelled or a fatal error occurs
    async fn process(
        &self,
        ctx: CancellationToken,
        input: FrameReceiver,
        output: FrameSender,
    ) -> Result<()>;

    /// Get processor name for tracing
    fn name(&self) -> &'static str {
        "processor"
    }
}

/// Per-frame logic driven by a standard read-process-write loop
///
/// Returns the frames to write downstream, in order; an empty vector drops
/// the input frame.
#[async_trait]
pub trait FrameHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: &CancellationToken, frame: Frame) -> Result<Vec<Frame>>;

    /// Get handler name for tracing
    fn name(&self) -> &'static str {
        "frame_handler"
    }
}

/// Receive the next frame, honouring cancellation
///
/// `Ok(None)` means the input channel closed.
pub async fn recv_frame(ctx: &CancellationToken, input: &mut FrameReceiver) -> Result<Option<Frame>> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::Cancelled),
        frame = input.recv() => Ok(frame),
    }
}

/// Send a frame downstream, honouring cancellation
///
/// Returns [`Error::ChannelClosed`] when the downstream receiver is gone.
pub async fn emit(ctx: &CancellationToken, output: &FrameSender, frame: Frame) -> Result<()> {
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::Cancelled),
        sent = output.send(frame) => sent.map_err(|_| Error::ChannelClosed),
    }
}

/// Read frames until `input` closes or `ctx` is cancelled, writing every
/// frame the handler produces to `output`
///
/// A handler error aborts the loop and is returned. A downstream stage that
/// stopped reading ends the loop gracefully; that stage reports its own error.
pub async fn frame_loop<H>(
    handler: &H,
    ctx: CancellationToken,
    mut input: FrameReceiver,
    output: FrameSender,
) -> Result<()>
where
    H: FrameHandler + ?Sized,
{
    while let Some(frame) = recv_frame(&ctx, &mut input).await? {
        for out in handler.handle(&ctx, frame).await? {
            match emit(&ctx, &output, out).await {
                Ok(()) => {}
                Err(Error::ChannelClosed) => {
                    tracing::debug!(handler = handler.name(), "Downstream closed, stopping");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

/// Adapts a [`FrameHandler`] into a [`FrameProcessor`]
pub struct FrameLoop<H> {
    handler: H,
}

impl<H: FrameHandler> FrameLoop<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H: FrameHandler> FrameProcessor for FrameLoop<H> {
    async fn process(
        &self,
        ctx: CancellationToken,
        input: FrameReceiver,
        output: FrameSender,
    ) -> Result<()> {
        frame_loop(&self.handler, ctx, input, output).await
    }

    fn name(&self) -> &'static str {
        self.handler.name()
    }
}

/// A plain async function used as a processor
pub struct ProcessorFn<F> {
    name: &'static str,
    func: F,
}

/// Wrap a function with the processor signature as a [`FrameProcessor`]
pub fn processor_fn<F, Fut>(name: &'static str, func: F) -> Arc<dyn FrameProcessor>
where
    F: Fn(CancellationToken, FrameReceiver, FrameSender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(ProcessorFn { name, func })
}

#[async_trait]
impl<F, Fut> FrameProcessor for ProcessorFn<F>
where
    F: Fn(CancellationToken, FrameReceiver, FrameSender) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn process(
        &self,
        ctx: CancellationToken,
        input: FrameReceiver,
        output: FrameSender,
    ) -> Result<()> {
        (self.func)(ctx, input, output).await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
