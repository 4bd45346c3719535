//! VAD pipeline stage
//!
//! Audio frames are classified by the detector. Speech edges become control
//! frames (`start`, `end_of_utterance`) and only audio classified as speech
//! is forwarded. Everything that is not audio passes through untouched.

use async_trait::async_trait;
use framevoice_core::{
    frame_loop, CancellationToken, Frame, FrameHandler, FrameProcessor, FrameReceiver,
    FrameSender, Hooks, Result, SIGNAL_END_OF_UTTERANCE, SIGNAL_START,
};
use std::sync::Arc;

use super::{ActivityDetector, ActivityEvent};

pub struct VadProcessor {
    detector: Arc<dyn ActivityDetector>,
    hooks: Hooks,
}

impl VadProcessor {
    pub fn new(detector: Arc<dyn ActivityDetector>, hooks: Hooks) -> Self {
        Self { detector, hooks }
    }
}

#[async_trait]
impl FrameHandler for VadProcessor {
    async fn handle(&self, ctx: &CancellationToken, frame: Frame) -> Result<Vec<Frame>> {
        if !frame.is_audio() {
            return Ok(vec![frame]);
        }

        let result = match self.detector.detect_activity(ctx, &frame.data).await {
            Ok(result) => result,
            Err(err) => {
                // A flaky detector must not kill the pipeline unless a hook says so
                if let Some(on_error) = &self.hooks.on_error {
                    return match on_error(&err) {
                        Some(fatal) => Err(fatal),
                        None => Ok(vec![]),
                    };
                }
                metrics::counter!("voice_vad_errors_total").increment(1);
                tracing::warn!(error = %err, "VAD failed, dropping audio frame");
                return Ok(vec![]);
            }
        };

        let mut out = Vec::with_capacity(2);
        match result.event_type {
            ActivityEvent::SpeechStart => {
                self.hooks.speech_start();
                out.push(Frame::control(SIGNAL_START));
            }
            ActivityEvent::SpeechEnd => {
                self.hooks.speech_end();
                out.push(Frame::control(SIGNAL_END_OF_UTTERANCE));
            }
            ActivityEvent::Silence => {}
        }
        if result.is_speech {
            out.push(frame);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "vad"
    }
}

#[async_trait]
impl FrameProcessor for VadProcessor {
    async fn process(
        &self,
        ctx: CancellationToken,
        input: FrameReceiver,
        output: FrameSender,
    ) -> Result<()> {
        frame_loop(self, ctx, input, output).await
    }

    fn name(&self) -> &'static str {
        "vad"
    }
}
