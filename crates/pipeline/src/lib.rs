//! Frame pipeline with VAD, processor chains and S2S/cascade dispatch
//!
//! This crate provides the pipeline engine:
//! - Channel-based processor chains
//! - Voice Activity Detection (energy detector + provider registry)
//! - Cascading VoicePipeline (Transport → VAD → STT → LLM → TTS → Transport)
//! - HybridPipeline switching between S2S and cascade

pub mod hybrid;
pub mod orchestrator;
pub mod processors;
pub mod vad;

// Processor exports
pub use processors::{
    chain, chain_with_capacity, FilterProcessor, MapProcessor, PassthroughProcessor,
    ProcessorChain, ProcessorChainBuilder,
};

// VAD exports
pub use vad::{
    list_vad, new_vad, register_vad, ActivityDetector, ActivityEvent, ActivityResult, EnergyVad,
    EnergyVadConfig, VadFactory, VadProcessor,
};

// Orchestrator exports
pub use orchestrator::{PipelineConfig, PipelineEvent, VoicePipeline, VoicePipelineBuilder};

// Hybrid exports
pub use hybrid::{
    DefaultSwitchPolicy, HybridPipeline, HybridPipelineBuilder, PipelineMode, PipelineState,
    SwitchPolicy,
};
