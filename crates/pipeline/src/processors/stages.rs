//! Closure-backed stages for glue between providers
//!
//! Handy for adapting provider output without writing a full processor,
//! e.g. dropping control frames ahead of an STT engine that only accepts
//! audio, or tagging frames with session metadata.

use async_trait::async_trait;
use framevoice_core::{
    frame_loop, CancellationToken, Frame, FrameHandler, FrameProcessor, FrameReceiver,
    FrameSender, Result,
};

type Predicate = Box<dyn Fn(&Frame) -> bool + Send + Sync>;
type Mapper = Box<dyn Fn(Frame) -> Frame + Send + Sync>;

/// Forwards frames for which `keep` returns true; the rest are dropped
pub struct FilterProcessor {
    name: &'static str,
    keep: Predicate,
}

impl FilterProcessor {
    pub fn new(name: &'static str, keep: impl Fn(&Frame) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name,
            keep: Box::new(keep),
        }
    }
}

#[async_trait]
impl FrameHandler for FilterProcessor {
    async fn handle(&self, _ctx: &CancellationToken, frame: Frame) -> Result<Vec<Frame>> {
        let keep = (self.keep)(&frame);
        Ok(if keep { vec![frame] } else { Vec::new() })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[async_trait]
impl FrameProcessor for FilterProcessor {
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

/// Replaces every frame with `map(frame)`, one in, one out
pub struct MapProcessor {
    name: &'static str,
    map: Mapper,
}

impl MapProcessor {
    pub fn new(name: &'static str, map: impl Fn(Frame) -> Frame + Send + Sync + 'static) -> Self {
        Self {
            name,
            map: Box::new(map),
        }
    }
}

#[async_trait]
impl FrameHandler for MapProcessor {
    async fn handle(&self, _ctx: &CancellationToken, frame: Frame) -> Result<Vec<Frame>> {
        Ok(vec![(self.map)(frame)])
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[async_trait]
impl FrameProcessor for MapProcessor {
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
