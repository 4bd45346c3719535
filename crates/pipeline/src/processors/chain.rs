//! Channel-based processor chain
//!
//! Connects multiple FrameProcessors with tokio channels for
//! concurrent, streaming frame processing.

use async_trait::async_trait;
use framevoice_core::{
    frame_loop, CancellationToken, Error, Frame, FrameHandler, FrameProcessor, FrameReceiver,
    FrameSender, Result, DEFAULT_CHANNEL_CAPACITY,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// A chain of frame processors connected by channels
///
/// Every stage runs in its own task. The chain returns once all stages have
/// returned, with the first stage error if any.
pub struct ProcessorChain {
    /// Name of this chain
    name: String,
    /// Processors in order
    processors: Vec<Arc<dyn FrameProcessor>>,
    /// Channel capacity
    channel_capacity: usize,
}

impl ProcessorChain {
    /// Create a new processor chain
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processors: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Create using the builder
    pub fn builder(name: impl Into<String>) -> ProcessorChainBuilder {
        ProcessorChainBuilder::new(name)
    }

    /// Add a processor to the chain
    pub fn add<P: FrameProcessor>(&mut self, processor: P) -> &mut Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Add a shared processor to the chain
    pub fn add_shared(&mut self, processor: Arc<dyn FrameProcessor>) -> &mut Self {
        self.processors.push(processor);
        self
    }

    /// Get the chain name
    pub fn chain_name(&self) -> &str {
        &self.name
    }

    /// Get number of processors
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Check if chain is empty
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }
}

#[async_trait]
impl FrameProcessor for ProcessorChain {
    async fn process(
        &self,
        ctx: CancellationToken,
        input: FrameReceiver,
        output: FrameSender,
    ) -> Result<()> {
        if self.processors.is_empty() {
            return frame_loop(&PassthroughProcessor::new("passthrough"), ctx, input, output).await;
        }

        // Stages share a child token so a failing stage can unblock its peers
        let stage_ctx = ctx.child_token();
        let mut receivers = Vec::with_capacity(self.processors.len());
        let mut senders = Vec::with_capacity(self.processors.len());
        receivers.push(input);
        for _ in 1..self.processors.len() {
            let (tx, rx) = mpsc::channel::<Frame>(self.channel_capacity);
            senders.push(tx);
            receivers.push(rx);
        }
        senders.push(output);

        tracing::debug!(chain = %self.name, stages = self.processors.len(), "Starting chain");

        let mut tasks = JoinSet::new();
        let stages = self.processors.iter().zip(receivers).zip(senders);
        for (i, ((processor, rx), tx)) in stages.enumerate() {
            let processor = Arc::clone(processor);
            let ctx = stage_ctx.clone();
            tasks.spawn(async move {
                let name = processor.name();
                let result = processor.process(ctx, rx, tx).await;
                (i, name, result)
            });
        }

        // Drain every stage so no task outlives the chain
        let mut first_err: Option<Error> = None;
        while let Some(joined) = tasks.join_next().await {
            let err = match joined {
                Ok((_, _, Ok(()))) => continue,
                Ok((stage, name, Err(e))) => {
                    if !matches!(e, Error::Cancelled | Error::ChannelClosed) {
                        tracing::error!(chain = %self.name, stage, processor = name, error = %e, "Stage failed");
                    }
                    e
                }
                Err(join_err) => {
                    tracing::error!(chain = %self.name, error = %join_err, "Stage task failed");
                    Error::TaskPanicked(join_err.to_string())
                }
            };

            stage_ctx.cancel();
            let replace = match &first_err {
                None => true,
                // A peer that merely saw its channel go away is not the root cause
                Some(Error::ChannelClosed) => !matches!(err, Error::ChannelClosed | Error::Cancelled),
                Some(_) => false,
            };
            if replace {
                first_err = Some(err);
            }
        }

        tracing::debug!(chain = %self.name, failed = first_err.is_some(), "Chain finished");

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "processor_chain"
    }
}

/// Builder for ProcessorChain
pub struct ProcessorChainBuilder {
    chain: ProcessorChain,
}

impl ProcessorChainBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            chain: ProcessorChain::new(name),
        }
    }

    /// Add a processor
    pub fn processor<P: FrameProcessor>(mut self, processor: P) -> Self {
        self.chain.add(processor);
        self
    }

    /// Add a shared processor
    pub fn processor_shared(mut self, processor: Arc<dyn FrameProcessor>) -> Self {
        self.chain.add_shared(processor);
        self
    }

    /// Set channel capacity (clamped to at least 1)
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.chain.channel_capacity = capacity.max(1);
        self
    }

    /// Build the chain
    pub fn build(self) -> ProcessorChain {
        self.chain
    }
}

/// Compose processors in series
///
/// No processors yields a pass-through stage; a single processor is returned
/// as is.
pub fn chain(processors: Vec<Arc<dyn FrameProcessor>>) -> Arc<dyn FrameProcessor> {
    chain_with_capacity(processors, DEFAULT_CHANNEL_CAPACITY)
}

/// [`chain`] with an explicit intermediate channel capacity
pub fn chain_with_capacity(
    mut processors: Vec<Arc<dyn FrameProcessor>>,
    capacity: usize,
) -> Arc<dyn FrameProcessor> {
    match processors.len() {
        0 => Arc::new(PassthroughProcessor::new("passthrough")),
        1 => processors.remove(0),
        _ => {
            let mut builder = ProcessorChain::builder("chain").channel_capacity(capacity);
            for processor in processors {
                builder = builder.processor_shared(processor);
            }
            Arc::new(builder.build())
        }
    }
}

/// A processor that forwards every frame unchanged
pub struct PassthroughProcessor {
    name: &'static str,
}

impl PassthroughProcessor {
    /// Create a new passthrough processor
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl FrameHandler for PassthroughProcessor {
    async fn handle(&self, _ctx: &CancellationToken, frame: Frame) -> Result<Vec<Frame>> {
        Ok(vec![frame])
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[async_trait]
impl FrameProcessor for PassthroughProcessor {
    async fn process(
        &self,
        ctx: CancellationToken,
        input: FrameReceiver,
        output: FrameSender,
    ) -> Result<()> {
        frame_loop(self, ctx, input, output).await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
