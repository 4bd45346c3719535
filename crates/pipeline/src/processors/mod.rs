//! Frame processors for the pipeline
//!
//! - ProcessorChain: channel-based chain connecting processors
//! - PassthroughProcessor: forwards frames unchanged
//! - FilterProcessor / MapProcessor: closure-backed glue stages

mod chain;
mod stages;

pub use chain::{chain, chain_with_capacity, PassthroughProcessor, ProcessorChain, ProcessorChainBuilder};
pub use stages::{FilterProcessor, MapProcessor};
