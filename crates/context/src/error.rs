//! Context compiler error taxonomy.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ContextError {
    #[error("embedding service call failed: {0}")]
    Embedding(String),

    #[error("vector recall call failed: {0}")]
    Recall(String),

    #[error("mandatory atoms {0} and {1} conflict; compilation aborted")]
    MandatoryConflict(String, String),

    #[error(transparent)]
    Kernel(#[from] nsk_kernel::Error),
}

pub type Result<T> = std::result::Result<T, ContextError>;
