//! Error types for exec mode.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("agent initialization failed: {0}")]
    InitializationFailed(String),

    #[error("agent execution failed: {0}")]
    ExecutionFailed(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("core error: {0}")]
    CoreError(String),
}

impl From<nsk_core::Error> for ExecError {
    fn from(err: nsk_core::Error) -> Self {
        ExecError::CoreError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;
