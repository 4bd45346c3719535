//! Voice Pipeline Orchestrator
//!
//! Cascading mode: Transport → VAD → STT → LLM → TTS → Transport, wired as a
//! single processor chain. Every stage is optional except the transport.

use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;

use framevoice_config::Settings;
use framevoice_core::{
    compose_hooks, CancellationToken, Error, FrameProcessor, Hooks, Result, Transport,
    TransportOp, VoiceSession, DEFAULT_CHANNEL_CAPACITY,
};

use crate::processors::chain_with_capacity;
use crate::vad::{self, ActivityDetector, VadProcessor};

/// Pipeline events observed during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    /// VAD detected speech
    SpeechStart,
    /// VAD detected the end of an utterance
    SpeechEnd,
}

/// Pipeline configuration
#[derive(Clone)]
pub struct PipelineConfig {
    /// Frame source and sink; required
    pub transport: Option<Arc<dyn Transport>>,
    pub vad: Option<Arc<dyn ActivityDetector>>,
    pub stt: Option<Arc<dyn FrameProcessor>>,
    pub llm: Option<Arc<dyn FrameProcessor>>,
    pub tts: Option<Arc<dyn FrameProcessor>>,
    pub hooks: Hooks,
    /// Conversation state shared with the caller
    pub session: Option<Arc<VoiceSession>>,
    /// Capacity of every stage-to-stage channel
    pub channel_buffer_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transport: None,
            vad: None,
            stt: None,
            llm: None,
            tts: None,
            hooks: Hooks::default(),
            session: None,
            channel_buffer_size: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("transport", &self.transport.is_some())
            .field("vad", &self.vad.is_some())
            .field("stt", &self.stt.as_ref().map(|p| p.name()))
            .field("llm", &self.llm.as_ref().map(|p| p.name()))
            .field("tts", &self.tts.as_ref().map(|p| p.name()))
            .field("hooks", &self.hooks)
            .field("session", &self.session.as_ref().map(|s| s.id()))
            .field("channel_buffer_size", &self.channel_buffer_size)
            .finish()
    }
}

/// Cascading voice pipeline
#[derive(Debug)]
pub struct VoicePipeline {
    config: PipelineConfig,
}

impl VoicePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Create using the builder
    pub fn builder() -> VoicePipelineBuilder {
        VoicePipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Arc<VoiceSession>> {
        self.config.session.as_ref()
    }

    /// Run until the transport's input closes, `ctx` is cancelled or a
    /// stage fails
    ///
    /// Frames already produced are delivered to the transport before a
    /// successful return.
    pub async fn run(&self, ctx: &CancellationToken) -> Result<()> {
        self.run_with_hooks(ctx, self.config.hooks.clone()).await
    }

    /// Run once, observing speech events as a stream
    ///
    /// The stream drives the run: nothing happens until it is polled, and it
    /// ends when the run does. A failed run yields its error last.
    pub fn events(&self, ctx: CancellationToken) -> impl Stream<Item = Result<PipelineEvent>> + Send + '_ {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        let start_tx = event_tx.clone();
        let tap = Hooks::new()
            .with_speech_start(move || {
                let _ = start_tx.send(PipelineEvent::SpeechStart);
            })
            .with_speech_end(move || {
                let _ = event_tx.send(PipelineEvent::SpeechEnd);
            });
        let hooks = compose_hooks([self.config.hooks.clone(), tap]);

        async_stream::stream! {
            let run = self.run_with_hooks(&ctx, hooks);
            tokio::pin!(run);

            let result = loop {
                let event = tokio::select! {
                    result = &mut run => break result,
                    Some(event) = event_rx.recv() => event,
                };
                yield Ok(event);
            };

            while let Ok(event) = event_rx.try_recv() {
                yield Ok(event);
            }
            if let Err(err) = result {
                yield Err(err);
            }
        }
    }

    fn stages(&self, hooks: Hooks) -> Vec<Arc<dyn FrameProcessor>> {
        let mut stages: Vec<Arc<dyn FrameProcessor>> = Vec::with_capacity(4);
        if let Some(detector) = &self.config.vad {
            stages.push(Arc::new(VadProcessor::new(Arc::clone(detector), hooks)));
        }
        stages.extend(
            [&self.config.stt, &self.config.llm, &self.config.tts]
                .into_iter()
                .flatten()
                .cloned(),
        );
        stages
    }

    async fn run_with_hooks(&self, ctx: &CancellationToken, hooks: Hooks) -> Result<()> {
        let transport = self
            .config
            .transport
            .clone()
            .ok_or_else(|| Error::config("transport is required"))?;

        let stages = self.stages(hooks);
        if stages.is_empty() {
            return Err(Error::config("no processors configured"));
        }

        let input = transport
            .recv(ctx.clone())
            .await
            .map_err(|e| Error::transport(TransportOp::Recv, e))?;

        let capacity = self.config.channel_buffer_size.max(1);
        let chain = chain_with_capacity(stages, capacity);
        let (out_tx, mut out_rx) = mpsc::channel(capacity);

        // Cancelled when the transport stops accepting frames
        let chain_ctx = ctx.child_token();

        tracing::debug!(config = ?self.config, "Voice pipeline started");

        // Owns the receiver so a failed send also closes the chain's output
        let drain_cancel = chain_ctx.clone();
        let drain = async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = transport.send(ctx, frame).await {
                    tracing::error!(error = %e, "Transport send failed");
                    drain_cancel.cancel();
                    return Err(Error::transport(TransportOp::Send, e));
                }
                metrics::counter!("voice_frames_sent_total").increment(1);
            }
            Ok(())
        };

        let (chain_result, drain_result) =
            tokio::join!(chain.process(chain_ctx, input, out_tx), drain);

        drain_result?;
        chain_result?;

        tracing::debug!("Voice pipeline finished");
        Ok(())
    }
}

/// Builder for VoicePipeline
#[derive(Debug, Default)]
pub struct VoicePipelineBuilder {
    config: PipelineConfig,
}

impl VoicePipelineBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn vad(mut self, vad: Arc<dyn ActivityDetector>) -> Self {
        self.config.vad = Some(vad);
        self
    }

    pub fn stt(mut self, stt: Arc<dyn FrameProcessor>) -> Self {
        self.config.stt = Some(stt);
        self
    }

    pub fn llm(mut self, llm: Arc<dyn FrameProcessor>) -> Self {
        self.config.llm = Some(llm);
        self
    }

    pub fn tts(mut self, tts: Arc<dyn FrameProcessor>) -> Self {
        self.config.tts = Some(tts);
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.config.hooks = hooks;
        self
    }

    pub fn session(mut self, session: Arc<VoiceSession>) -> Self {
        self.config.session = Some(session);
        self
    }

    /// Set channel capacity; 0 keeps the default
    pub fn channel_buffer_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.config.channel_buffer_size = size;
        }
        self
    }

    /// Apply the `pipeline` and `vad` sections of loaded settings
    pub fn with_settings(mut self, settings: &Settings) -> Result<Self> {
        self = self.channel_buffer_size(settings.pipeline.channel_buffer_size);
        if let Some(detector) = vad::from_settings(&settings.vad)? {
            self.config.vad = Some(detector);
        }
        Ok(self)
    }

    /// Build the pipeline
    pub fn build(self) -> VoicePipeline {
        VoicePipeline::new(self.config)
    }
}
