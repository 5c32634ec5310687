//! Autopoiesis error taxonomy. `kernel::Error` covers engine rejections;
//! this enum covers the loop-level reasons a proposal never reaches commit.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AutopoiesisError {
    #[error("llm call failed: {0}")]
    Llm(String),

    #[error("per-rule retry budget ({budget}) exhausted without a valid rule")]
    RetryBudgetExhausted { budget: u32 },

    #[error("per-session retry budget ({budget}) exhausted")]
    SessionBudgetExhausted { budget: u32 },

    #[error("prompt hash {0} retried past its cap")]
    PromptHashCapExceeded(String),

    #[error("sandbox rejected candidate rule: {0}")]
    SandboxRejected(#[from] nsk_kernel::Error),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("stagnation: same candidate hash seen at two history steps")]
    Stagnation,

    #[error("committing would decrease stability from {current:.2} to {proposed:.2}")]
    StabilityRegression { current: f64, proposed: f64 },

    #[error("max iterations ({0}) exceeded")]
    MaxIterationsExceeded(u32),

    #[error("static audit rejected candidate tool: {0}")]
    AuditRejected(String),

    #[error("sandbox compilation failed: {0}")]
    CompilationFailed(String),

    #[error("candidate tool failed adversarial testing: {0}")]
    ThunderdomeFailed(String),
}

pub type Result<T> = std::result::Result<T, AutopoiesisError>;
