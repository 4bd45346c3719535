//! End-to-end tests for the voice pipeline

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use framevoice_core::{
    processor_fn, CancellationToken, Error, Frame, FrameProcessor, FrameReceiver, FrameSender,
    FrameType, Hooks, Result, Transport, TransportOp, VoiceSession, SIGNAL_END_OF_UTTERANCE,
    SIGNAL_START,
};
use framevoice_pipeline::{
    chain, ActivityDetector, ActivityResult, DefaultSwitchPolicy, EnergyVad, EnergyVadConfig,
    FilterProcessor, HybridPipeline, MapProcessor, PassthroughProcessor, PipelineEvent,
    PipelineMode, VoicePipeline,
};

// --- helpers ---

fn sine_pcm(samples: usize, amplitude: f64, freq: f64, sample_rate: f64) -> Vec<u8> {
    (0..samples)
        .flat_map(|i| {
            let t = i as f64 / sample_rate;
            let s = (amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()) as i16;
            s.to_le_bytes()
        })
        .collect()
}

fn constant_pcm(samples: usize, value: i16) -> Vec<u8> {
    std::iter::repeat(value.to_le_bytes())
        .take(samples)
        .flatten()
        .collect()
}

fn passthrough() -> Arc<dyn FrameProcessor> {
    Arc::new(PassthroughProcessor::new("passthrough"))
}

fn energy_vad() -> Arc<dyn ActivityDetector> {
    Arc::new(EnergyVad::new(EnergyVadConfig { threshold: 500.0 }))
}

/// Replays a fixed set of frames and records what is sent back
#[derive(Default)]
struct MockTransport {
    frames: Vec<Frame>,
    sent: Mutex<Vec<Frame>>,
    recv_error: Option<Error>,
    send_error: Option<Error>,
}

impl MockTransport {
    fn with_frames(frames: Vec<Frame>) -> Arc<Self> {
        Arc::new(Self {
            frames,
            ..Self::default()
        })
    }

    fn sent(&self) -> Vec<Frame> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn recv(&self, _ctx: CancellationToken) -> Result<FrameReceiver> {
        if let Some(err) = &self.recv_error {
            return Err(err.clone());
        }
        let (tx, rx) = mpsc::channel(self.frames.len().max(1));
        for frame in &self.frames {
            tx.try_send(frame.clone()).map_err(|_| Error::ChannelClosed)?;
        }
        Ok(rx)
    }

    async fn send(&self, _ctx: &CancellationToken, frame: Frame) -> Result<()> {
        if let Some(err) = &self.send_error {
            return Err(err.clone());
        }
        self.sent.lock().push(frame);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Input channel that stays open until the transport is dropped
struct BlockingTransport {
    _tx: mpsc::Sender<Frame>,
    rx: Mutex<Option<FrameReceiver>>,
}

impl BlockingTransport {
    fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel(1);
        Arc::new(Self {
            _tx: tx,
            rx: Mutex::new(Some(rx)),
        })
    }
}

#[async_trait]
impl Transport for BlockingTransport {
    async fn recv(&self, _ctx: CancellationToken) -> Result<FrameReceiver> {
        self.rx.lock().take().ok_or(Error::ChannelClosed)
    }

    async fn send(&self, _ctx: &CancellationToken, _frame: Frame) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct FailingVad;

#[async_trait]
impl ActivityDetector for FailingVad {
    async fn detect_activity(&self, _ctx: &CancellationToken, _audio: &[u8]) -> Result<ActivityResult> {
        Err(Error::Vad("vad processing failed".into()))
    }
}

async fn run_chain(processor: &dyn FrameProcessor, frames: Vec<Frame>) -> (Result<()>, Vec<Frame>) {
    let (in_tx, in_rx) = mpsc::channel(frames.len().max(1));
    let (out_tx, mut out_rx) = mpsc::channel(frames.len().max(1));
    for frame in frames {
        in_tx.send(frame).await.unwrap();
    }
    drop(in_tx);

    let result = processor.process(CancellationToken::new(), in_rx, out_tx).await;
    let mut out = Vec::new();
    while let Some(frame) = out_rx.recv().await {
        out.push(frame);
    }
    (result, out)
}

// --- chain ---

#[tokio::test]
async fn chain_of_passthroughs_is_identity() {
    let input: Vec<Frame> = vec![
        Frame::text("a"),
        Frame::audio(constant_pcm(4, 100), 16000),
        Frame::control(SIGNAL_START),
        Frame::image(vec![1, 2, 3], "image/png"),
        Frame::text("b"),
    ];

    for n in 1..=5 {
        let stages: Vec<Arc<dyn FrameProcessor>> = (0..n).map(|_| passthrough()).collect();
        let (result, out) = run_chain(chain(stages).as_ref(), input.clone()).await;
        result.unwrap();
        assert_eq!(out, input, "chain of {n} passthroughs");
    }
}

#[tokio::test]
async fn empty_chain_matches_single_passthrough() {
    let input = vec![Frame::text("x"), Frame::control("stop")];

    let (r1, empty_out) = run_chain(chain(vec![]).as_ref(), input.clone()).await;
    let (r2, single_out) = run_chain(chain(vec![passthrough()]).as_ref(), input.clone()).await;
    r1.unwrap();
    r2.unwrap();
    assert_eq!(empty_out, single_out);
    assert_eq!(empty_out, input);
}

#[tokio::test]
async fn chain_cancel_while_blocked() {
    let stages = chain(vec![passthrough(), passthrough(), passthrough()]);
    let ctx = CancellationToken::new();
    let (_in_tx, in_rx) = mpsc::channel(1);
    let (out_tx, _out_rx) = mpsc::channel(1);

    let task = {
        let ctx = ctx.clone();
        tokio::spawn(async move { stages.process(ctx, in_rx, out_tx).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    ctx.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("chain did not stop after cancellation")
        .unwrap();
    assert!(result.unwrap_err().is_cancelled());
}

// --- cascading pipeline ---

#[tokio::test]
async fn pipeline_forwards_text_in_order() {
    let transport = MockTransport::with_frames(vec![Frame::text("hello"), Frame::text("world")]);
    let pipeline = VoicePipeline::builder()
        .transport(transport.clone())
        .stt(passthrough())
        .build();

    pipeline.run(&CancellationToken::new()).await.unwrap();

    let sent: Vec<String> = transport
        .sent()
        .iter()
        .map(|f| f.text_content().to_string())
        .collect();
    assert_eq!(sent, vec!["hello", "world"]);
}

#[tokio::test]
async fn pipeline_with_all_stages() {
    let transport = MockTransport::with_frames(vec![Frame::text("input")]);
    let pipeline = VoicePipeline::builder()
        .transport(transport.clone())
        .stt(passthrough())
        .llm(passthrough())
        .tts(passthrough())
        .build();

    pipeline.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(transport.sent(), vec![Frame::text("input")]);
}

#[tokio::test]
async fn pipeline_vad_emits_speech_edges() {
    let loud = Frame::audio(sine_pcm(480, 5000.0, 440.0, 16000.0), 16000);
    let quiet = Frame::audio(constant_pcm(480, 10), 16000);
    let transport = MockTransport::with_frames(vec![loud.clone(), quiet]);

    let started = Arc::new(AtomicBool::new(false));
    let ended = Arc::new(AtomicBool::new(false));
    let hooks = Hooks::new()
        .with_speech_start({
            let started = Arc::clone(&started);
            move || started.store(true, Ordering::SeqCst)
        })
        .with_speech_end({
            let ended = Arc::clone(&ended);
            move || ended.store(true, Ordering::SeqCst)
        });

    let pipeline = VoicePipeline::builder()
        .transport(transport.clone())
        .vad(energy_vad())
        .stt(passthrough())
        .hooks(hooks)
        .build();

    pipeline.run(&CancellationToken::new()).await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 3, "sent: {sent:?}");
    assert_eq!(sent[0].kind, FrameType::Control);
    assert_eq!(sent[0].signal(), SIGNAL_START);
    assert_eq!(sent[1], loud);
    assert_eq!(sent[2].signal(), SIGNAL_END_OF_UTTERANCE);
    assert!(started.load(Ordering::SeqCst));
    assert!(ended.load(Ordering::SeqCst));
}

#[tokio::test]
async fn pipeline_vad_filters_silence() {
    let transport = MockTransport::with_frames(vec![Frame::audio(constant_pcm(480, 10), 16000)]);
    let pipeline = VoicePipeline::builder()
        .transport(transport.clone())
        .vad(energy_vad())
        .stt(passthrough())
        .build();

    pipeline.run(&CancellationToken::new()).await.unwrap();
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn pipeline_vad_passes_non_audio() {
    let transport = MockTransport::with_frames(vec![Frame::text("hello"), Frame::control("stop")]);
    let pipeline = VoicePipeline::builder()
        .transport(transport.clone())
        .vad(energy_vad())
        .build();

    pipeline.run(&CancellationToken::new()).await.unwrap();
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].text_content(), "hello");
    assert_eq!(sent[1].signal(), "stop");
}

#[tokio::test]
async fn vad_error_suppressed_by_hook() {
    let transport = MockTransport::with_frames(vec![
        Frame::audio(constant_pcm(480, 100), 16000),
        Frame::text("after-error"),
    ]);
    let hook_called = Arc::new(AtomicBool::new(false));
    let hooks = Hooks::new().with_error({
        let hook_called = Arc::clone(&hook_called);
        move |_| {
            hook_called.store(true, Ordering::SeqCst);
            None
        }
    });

    let pipeline = VoicePipeline::builder()
        .transport(transport.clone())
        .vad(Arc::new(FailingVad))
        .stt(passthrough())
        .hooks(hooks)
        .build();

    pipeline.run(&CancellationToken::new()).await.unwrap();
    assert!(hook_called.load(Ordering::SeqCst));
    assert_eq!(transport.sent(), vec![Frame::text("after-error")]);
}

#[tokio::test]
async fn vad_error_propagated_by_hook() {
    let transport = MockTransport::with_frames(vec![Frame::audio(constant_pcm(480, 100), 16000)]);
    let hooks = Hooks::new().with_error(|_| Some(Error::other("fatal: vad failure")));

    let pipeline = VoicePipeline::builder()
        .transport(transport.clone())
        .vad(Arc::new(FailingVad))
        .stt(passthrough())
        .hooks(hooks)
        .build();

    let err = pipeline.run(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "fatal: vad failure");
}

#[tokio::test]
async fn vad_error_without_hook_is_skipped() {
    let transport = MockTransport::with_frames(vec![
        Frame::audio(constant_pcm(480, 100), 16000),
        Frame::text("pass-through"),
    ]);
    let pipeline = VoicePipeline::builder()
        .transport(transport.clone())
        .vad(Arc::new(FailingVad))
        .stt(passthrough())
        .build();

    pipeline.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(transport.sent(), vec![Frame::text("pass-through")]);
}

#[tokio::test]
async fn pipeline_configuration_errors() {
    let no_transport = VoicePipeline::builder().stt(passthrough()).build();
    let err = no_transport.run(&CancellationToken::new()).await.unwrap_err();
    assert!(err.is_config());

    let no_processors = VoicePipeline::builder()
        .transport(MockTransport::with_frames(vec![]))
        .build();
    let err = no_processors.run(&CancellationToken::new()).await.unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn pipeline_wraps_recv_error() {
    let transport = Arc::new(MockTransport {
        recv_error: Some(Error::other("connection refused")),
        ..MockTransport::default()
    });
    let pipeline = VoicePipeline::builder()
        .transport(transport)
        .stt(passthrough())
        .build();

    let err = pipeline.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::Transport { op: TransportOp::Recv, .. }));
    assert_eq!(err.to_string(), "voice: transport recv: connection refused");
}

#[tokio::test]
async fn pipeline_wraps_send_error() {
    let transport = Arc::new(MockTransport {
        frames: vec![Frame::text("a"), Frame::text("b")],
        send_error: Some(Error::other("broken pipe")),
        ..MockTransport::default()
    });
    let pipeline = VoicePipeline::builder()
        .transport(transport)
        .stt(passthrough())
        .build();

    let err = pipeline.run(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::Transport { op: TransportOp::Send, .. }));
    assert_eq!(err.to_string(), "voice: transport send: broken pipe");
}

#[tokio::test]
async fn pipeline_send_error_releases_stage_blocked_on_output() {
    let transport = Arc::new(MockTransport {
        frames: vec![Frame::text("a")],
        send_error: Some(Error::other("broken pipe")),
        ..MockTransport::default()
    });
    // Ignores cancellation and writes more frames than the output channel holds
    let chatty = processor_fn("chatty", |_ctx, mut input: FrameReceiver, output: FrameSender| async move {
        while let Some(frame) = input.recv().await {
            for _ in 0..8 {
                output.send(frame.clone()).await.map_err(|_| Error::ChannelClosed)?;
            }
        }
        Ok::<(), Error>(())
    });
    let pipeline = VoicePipeline::builder()
        .transport(transport)
        .tts(chatty)
        .channel_buffer_size(1)
        .build();

    let err = tokio::time::timeout(Duration::from_secs(2), pipeline.run(&CancellationToken::new()))
        .await
        .expect("run must finish once the transport stops accepting frames")
        .unwrap_err();
    assert!(matches!(err, Error::Transport { op: TransportOp::Send, .. }));
}

#[tokio::test]
async fn pipeline_send_error_with_open_input_does_not_hang() {
    let (input_tx, input_rx) = mpsc::channel(4);
    input_tx.send(Frame::text("a")).await.unwrap();

    struct OpenInputFailingSend {
        rx: Mutex<Option<FrameReceiver>>,
    }

    #[async_trait]
    impl Transport for OpenInputFailingSend {
        async fn recv(&self, _ctx: CancellationToken) -> Result<FrameReceiver> {
            self.rx.lock().take().ok_or(Error::ChannelClosed)
        }
        async fn send(&self, _ctx: &CancellationToken, _frame: Frame) -> Result<()> {
            Err(Error::other("gone"))
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    let pipeline = VoicePipeline::builder()
        .transport(Arc::new(OpenInputFailingSend {
            rx: Mutex::new(Some(input_rx)),
        }))
        .stt(passthrough())
        .build();

    let err = tokio::time::timeout(Duration::from_secs(2), pipeline.run(&CancellationToken::new()))
        .await
        .expect("pipeline hung after send failure")
        .unwrap_err();
    assert!(err.is_transport());
    drop(input_tx);
}

#[tokio::test]
async fn pipeline_cancel_returns_error() {
    let pipeline = Arc::new(
        VoicePipeline::builder()
            .transport(BlockingTransport::new())
            .vad(energy_vad())
            .stt(passthrough())
            .build(),
    );
    let ctx = CancellationToken::new();

    let task = {
        let pipeline = Arc::clone(&pipeline);
        let ctx = ctx.clone();
        tokio::spawn(async move { pipeline.run(&ctx).await })
    };
    ctx.cancel();

    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("pipeline did not stop after cancellation")
        .unwrap();
    assert!(result.unwrap_err().is_cancelled());
}

// --- events ---

#[tokio::test]
async fn events_success_without_speech_yields_nothing() {
    let transport = MockTransport::with_frames(vec![Frame::text("hello")]);
    let pipeline = VoicePipeline::builder()
        .transport(transport.clone())
        .stt(passthrough())
        .build();

    let events: Vec<Result<PipelineEvent>> = pipeline.events(CancellationToken::new()).collect().await;
    assert!(events.is_empty());
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn events_report_speech_edges() {
    let transport = MockTransport::with_frames(vec![
        Frame::audio(constant_pcm(480, 3000), 16000),
        Frame::audio(constant_pcm(480, 0), 16000),
    ]);
    let configured_start = Arc::new(AtomicBool::new(false));
    let pipeline = VoicePipeline::builder()
        .transport(transport)
        .vad(energy_vad())
        .hooks(Hooks::new().with_speech_start({
            let flag = Arc::clone(&configured_start);
            move || flag.store(true, Ordering::SeqCst)
        }))
        .build();

    let events: Vec<PipelineEvent> = pipeline
        .events(CancellationToken::new())
        .map(|event| event.unwrap())
        .collect()
        .await;
    assert_eq!(events, vec![PipelineEvent::SpeechStart, PipelineEvent::SpeechEnd]);
    assert!(configured_start.load(Ordering::SeqCst));
}

#[tokio::test]
async fn events_failure_yields_error() {
    let pipeline = VoicePipeline::builder().stt(passthrough()).build();

    let events: Vec<Result<PipelineEvent>> = pipeline.events(CancellationToken::new()).collect().await;
    assert_eq!(events.len(), 1);
    assert!(events[0].as_ref().unwrap_err().is_config());
}

// --- hybrid ---

fn cascade_pipeline(transport: Arc<MockTransport>) -> VoicePipeline {
    VoicePipeline::builder()
        .transport(transport)
        .stt(passthrough())
        .build()
}

#[tokio::test]
async fn hybrid_switches_to_cascade_on_tool_calls() {
    let transport = MockTransport::with_frames(vec![Frame::text("hi")]);
    let hybrid = HybridPipeline::builder()
        .cascade(cascade_pipeline(transport.clone()))
        .switch_policy(DefaultSwitchPolicy::new(2))
        .build();
    assert_eq!(hybrid.current_mode(), PipelineMode::S2s);

    hybrid.update_state(5, 3);
    hybrid.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(hybrid.current_mode(), PipelineMode::Cascade);
    assert_eq!(transport.sent(), vec![Frame::text("hi")]);
}

#[tokio::test]
async fn hybrid_stays_in_s2s_below_threshold() {
    let ran = Arc::new(AtomicBool::new(false));
    let s2s = {
        let ran = Arc::clone(&ran);
        processor_fn("s2s", move |_ctx, mut input: FrameReceiver, output: FrameSender| {
            let ran = Arc::clone(&ran);
            async move {
                // Placeholder input is closed from the start
                assert!(input.recv().await.is_none());
                ran.store(true, Ordering::SeqCst);
                // More than the placeholder output holds; the discard drain keeps this moving
                for i in 0..16 {
                    output
                        .send(Frame::text(format!("ignored {i}")))
                        .await
                        .map_err(|_| Error::ChannelClosed)?;
                }
                Ok::<(), Error>(())
            }
        })
    };

    let hybrid = HybridPipeline::builder()
        .s2s(s2s)
        .session(Arc::new(VoiceSession::new("s2s-session")))
        .switch_policy(DefaultSwitchPolicy::default())
        .build();
    hybrid.update_state(1, 1);

    tokio::time::timeout(Duration::from_secs(2), hybrid.run(&CancellationToken::new()))
        .await
        .expect("s2s output must be drained")
        .unwrap();
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(hybrid.current_mode(), PipelineMode::S2s);
}

#[tokio::test]
async fn hybrid_s2s_requires_session() {
    let hybrid = HybridPipeline::builder().s2s(passthrough()).build();
    let err = hybrid.run(&CancellationToken::new()).await.unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn hybrid_s2s_mode_without_processor_falls_back_to_cascade() {
    let transport = MockTransport::with_frames(vec![Frame::text("fallback")]);
    let hybrid = HybridPipeline::builder()
        .cascade(cascade_pipeline(transport.clone()))
        .build();

    hybrid.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(transport.sent(), vec![Frame::text("fallback")]);
    assert_eq!(hybrid.current_mode(), PipelineMode::S2s);
}

#[tokio::test]
async fn hybrid_cascade_mode_requires_cascade() {
    let hybrid = HybridPipeline::builder()
        .s2s(passthrough())
        .session(Arc::new(VoiceSession::new("s")))
        .build();
    hybrid.set_mode(PipelineMode::Cascade);

    let err = hybrid.run(&CancellationToken::new()).await.unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn hybrid_cascade_persists_until_reset() {
    let s2s_runs = Arc::new(AtomicUsize::new(0));
    let s2s = {
        let s2s_runs = Arc::clone(&s2s_runs);
        processor_fn("s2s", move |_ctx, _input: FrameReceiver, _output: FrameSender| {
            let s2s_runs = Arc::clone(&s2s_runs);
            async move {
                s2s_runs.fetch_add(1, Ordering::SeqCst);
                Ok::<(), Error>(())
            }
        })
    };
    let transport = MockTransport::with_frames(vec![Frame::text("turn")]);
    let hybrid = HybridPipeline::builder()
        .s2s(s2s)
        .cascade(cascade_pipeline(transport.clone()))
        .session(Arc::new(VoiceSession::new("persist")))
        .switch_policy(DefaultSwitchPolicy::new(2))
        .build();
    let ctx = CancellationToken::new();

    hybrid.update_state(2, 1);
    hybrid.run(&ctx).await.unwrap();
    assert_eq!(hybrid.current_mode(), PipelineMode::Cascade);
    assert_eq!(transport.sent().len(), 1);

    // Tool calls dropping back below the threshold do not undo the switch
    hybrid.update_state(0, 2);
    hybrid.run(&ctx).await.unwrap();
    assert_eq!(hybrid.current_mode(), PipelineMode::Cascade);
    assert_eq!(transport.sent(), vec![Frame::text("turn"), Frame::text("turn")]);
    assert_eq!(s2s_runs.load(Ordering::SeqCst), 0);

    hybrid.set_mode(PipelineMode::S2s);
    hybrid.run(&ctx).await.unwrap();
    assert_eq!(hybrid.current_mode(), PipelineMode::S2s);
    assert_eq!(s2s_runs.load(Ordering::SeqCst), 1);
    assert_eq!(transport.sent().len(), 2);
}

// --- closure stages ---

#[tokio::test]
async fn pipeline_with_filter_and_map_stages() {
    let transport = MockTransport::with_frames(vec![
        Frame::text("hello"),
        Frame::control("stop"),
        Frame::text("world"),
    ]);
    let pipeline = VoicePipeline::builder()
        .transport(transport.clone())
        .stt(Arc::new(FilterProcessor::new("text_only", Frame::is_text)))
        .llm(Arc::new(MapProcessor::new("shout", |frame: Frame| {
            Frame::text(frame.text_content().to_uppercase())
        })))
        .build();

    pipeline.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(transport.sent(), vec![Frame::text("HELLO"), Frame::text("WORLD")]);
}
