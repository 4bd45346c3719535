//! Hybrid S2S / cascade pipeline
//!
//! Runs either a self-contained speech-to-speech processor or the cascading
//! [`VoicePipeline`], choosing the mode at the start of every run. A
//! [`SwitchPolicy`] may move the pipeline out of S2S once the conversation
//! needs capabilities S2S handles poorly (e.g. heavy tool use).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use framevoice_config::{HybridSettings, InitialMode};
use framevoice_core::{CancellationToken, Error, Frame, FrameProcessor, Result, VoiceSession};

use crate::orchestrator::VoicePipeline;

/// Which engine handles the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Native speech-to-speech
    #[default]
    S2s,
    /// VAD → STT → LLM → TTS
    Cascade,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::S2s => "s2s",
            PipelineMode::Cascade => "cascade",
        }
    }
}

impl std::fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<InitialMode> for PipelineMode {
    fn from(mode: InitialMode) -> Self {
        match mode {
            InitialMode::S2s => PipelineMode::S2s,
            InitialMode::Cascade => PipelineMode::Cascade,
        }
    }
}

/// Conversation statistics the switch policy decides on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineState {
    pub tool_call_count: u32,
    pub current_mode: PipelineMode,
    pub turn_count: u32,
}

/// Decides whether to leave the current mode
///
/// Must be a pure function of the state.
pub trait SwitchPolicy: Send + Sync + 'static {
    fn should_switch(&self, state: &PipelineState) -> bool;
}

/// Leaves S2S once the tool-call count reaches a threshold; never switches back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSwitchPolicy {
    pub tool_call_threshold: u32,
}

impl DefaultSwitchPolicy {
    pub const DEFAULT_THRESHOLD: u32 = 3;

    /// A zero threshold falls back to the default
    pub fn new(tool_call_threshold: u32) -> Self {
        let tool_call_threshold = if tool_call_threshold == 0 {
            Self::DEFAULT_THRESHOLD
        } else {
            tool_call_threshold
        };
        Self { tool_call_threshold }
    }

    /// Threshold in effect; zero means the default
    pub fn threshold(&self) -> u32 {
        match self.tool_call_threshold {
            0 => Self::DEFAULT_THRESHOLD,
            n => n,
        }
    }
}

impl Default for DefaultSwitchPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl From<&HybridSettings> for DefaultSwitchPolicy {
    fn from(settings: &HybridSettings) -> Self {
        Self::new(settings.tool_call_threshold)
    }
}

impl SwitchPolicy for DefaultSwitchPolicy {
    fn should_switch(&self, state: &PipelineState) -> bool {
        state.current_mode == PipelineMode::S2s && state.tool_call_count >= self.threshold()
    }
}

/// Pipeline that dispatches each run to S2S or cascade
pub struct HybridPipeline {
    s2s: Option<Arc<dyn FrameProcessor>>,
    cascade: Option<Arc<VoicePipeline>>,
    policy: Option<Arc<dyn SwitchPolicy>>,
    session: Option<Arc<VoiceSession>>,
    state: Mutex<PipelineState>,
}

impl HybridPipeline {
    /// Create using the builder
    pub fn builder() -> HybridPipelineBuilder {
        HybridPipelineBuilder::default()
    }

    pub fn session(&self) -> Option<&Arc<VoiceSession>> {
        self.session.as_ref()
    }

    /// Mode the next run starts from
    pub fn current_mode(&self) -> PipelineMode {
        self.state.lock().current_mode
    }

    /// Snapshot of the policy inputs
    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Record conversation progress for the next policy decision
    pub fn update_state(&self, tool_calls: u32, turn_count: u32) {
        let mut state = self.state.lock();
        state.tool_call_count = tool_calls;
        state.turn_count = turn_count;
    }

    /// Force a mode, e.g. to return to S2S after a policy switch
    pub fn set_mode(&self, mode: PipelineMode) {
        self.state.lock().current_mode = mode;
    }

    /// Consult the policy, then run the selected engine
    pub async fn run(&self, ctx: &CancellationToken) -> Result<()> {
        if self.s2s.is_none() && self.cascade.is_none() {
            return Err(Error::config("hybrid pipeline needs an S2S processor or a cascade pipeline"));
        }

        let mode = self.select_mode();
        match mode {
            PipelineMode::S2s => match &self.s2s {
                Some(s2s) => {
                    if self.session.is_none() {
                        return Err(Error::config("session is required for S2S mode"));
                    }
                    self.run_s2s(ctx, Arc::clone(s2s)).await
                }
                None => self.run_cascade(ctx).await,
            },
            PipelineMode::Cascade => self.run_cascade(ctx).await,
        }
    }

    fn select_mode(&self) -> PipelineMode {
        let mut state = self.state.lock();
        if let Some(policy) = &self.policy {
            if policy.should_switch(&state) {
                let from = state.current_mode;
                state.current_mode = PipelineMode::Cascade;
                metrics::counter!("voice_mode_switches_total").increment(1);
                tracing::info!(
                    %from,
                    to = %state.current_mode,
                    tool_calls = state.tool_call_count,
                    turns = state.turn_count,
                    "Switching pipeline mode"
                );
            }
        }
        state.current_mode
    }

    async fn run_cascade(&self, ctx: &CancellationToken) -> Result<()> {
        match &self.cascade {
            Some(cascade) => cascade.run(ctx).await,
            None => Err(Error::config("cascade pipeline is required for cascade mode")),
        }
    }

    /// S2S owns its audio I/O; the frame channels are placeholders
    async fn run_s2s(&self, ctx: &CancellationToken, s2s: Arc<dyn FrameProcessor>) -> Result<()> {
        let (_, input) = mpsc::channel::<Frame>(1);
        let (output, mut discard) = mpsc::channel::<Frame>(1);

        let drain = async {
            while discard.recv().await.is_some() {}
        };

        let (result, ()) = tokio::join!(s2s.process(ctx.clone(), input, output), drain);
        result
    }
}

impl std::fmt::Debug for HybridPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridPipeline")
            .field("s2s", &self.s2s.as_ref().map(|p| p.name()))
            .field("cascade", &self.cascade.is_some())
            .field("policy", &self.policy.is_some())
            .field("session", &self.session.as_ref().map(|s| s.id()))
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for HybridPipeline
#[derive(Default)]
pub struct HybridPipelineBuilder {
    s2s: Option<Arc<dyn FrameProcessor>>,
    cascade: Option<Arc<VoicePipeline>>,
    policy: Option<Arc<dyn SwitchPolicy>>,
    session: Option<Arc<VoiceSession>>,
    initial_mode: PipelineMode,
}

impl HybridPipelineBuilder {
    pub fn s2s(mut self, s2s: Arc<dyn FrameProcessor>) -> Self {
        self.s2s = Some(s2s);
        self
    }

    pub fn cascade(mut self, cascade: impl Into<Arc<VoicePipeline>>) -> Self {
        self.cascade = Some(cascade.into());
        self
    }

    pub fn switch_policy(mut self, policy: impl SwitchPolicy) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn session(mut self, session: Arc<VoiceSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn initial_mode(mut self, mode: PipelineMode) -> Self {
        self.initial_mode = mode;
        self
    }

    /// Install the default policy and start mode from loaded settings
    pub fn with_settings(self, settings: &HybridSettings) -> Self {
        self.switch_policy(DefaultSwitchPolicy::from(settings))
            .initial_mode(settings.initial_mode.into())
    }

    pub fn build(self) -> HybridPipeline {
        HybridPipeline {
            s2s: self.s2s,
            cascade: self.cascade,
            policy: self.policy,
            session: self.session,
            state: Mutex::new(PipelineState {
                current_mode: self.initial_mode,
                ..PipelineState::default()
            }),
        }
    }
}
