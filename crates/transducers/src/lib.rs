//! Perception and Articulation: the dual-channel protocol translating
//! between natural language and the kernel's logic.
//!
//! Perception turns user text into atoms the kernel can reason over.
//! Articulation turns derived facts and an LLM's dual-channel reply back
//! into a surface response plus gated kernel mutations. Neither transducer
//! makes decisions; both only get information into and out of the kernel in
//! a shape it can check.

pub mod articulation;
pub mod error;
pub mod llm;
pub mod perception;
pub mod repair;

pub use articulation::{ArticulationTransducer, ControlPacket, DualChannelReply, MangleOutcome};
pub use error::{Error, Result};
pub use llm::{AnthropicClient, LlmClient, OpenAiClient, ScriptedClient};
pub use perception::{
    NullSimilarityService, PerceptionTransducer, SimilarityCandidate, VectorSimilarityService,
    FOCUS_CONFIDENCE_THRESHOLD,
};
