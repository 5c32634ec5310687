//! Dispatcher error taxonomy.
//!
//! Every variant corresponds to one of the non-execution failure classes from
//! the error handling design (Permission, Dream-unsafe) plus the Execution
//! class for handler failures. All of these become facts via `to_fact` so a
//! rejected dispatch is something the rule set can reason about, not just a
//! caller-visible error.

use nsk_kernel::{Fact, Symbol, SymbolTable, Term};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    #[error("action kind {0} is not permitted")]
    PermissionDenied(String),

    #[error("action blocked: {0}")]
    Blocked(String),

    #[error("dream-unsafe: {0}")]
    DreamUnsafe(String),

    #[error("no handler registered for action kind {0}")]
    NoHandler(String),

    #[error("execution failed at stage {stage}: {reason}")]
    Execution { stage: String, reason: String },

    #[error("kernel error: {0}")]
    Kernel(#[from] nsk_kernel::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

impl DispatchError {
    pub fn to_fact(&self, table: &SymbolTable, action_id: &str) -> Fact {
        let predicate: Symbol = table.intern("execution_error");
        let stage = table.intern(self.stage());
        Fact::new(
            predicate,
            vec![
                Term::Str(action_id.to_string()),
                Term::Atom(stage),
                Term::Str(self.to_string()),
            ],
        )
    }

    fn stage(&self) -> &'static str {
        match self {
            DispatchError::PermissionDenied(_) => "permission",
            DispatchError::Blocked(_) => "permission",
            DispatchError::DreamUnsafe(_) => "dream",
            DispatchError::NoHandler(_) => "dispatch",
            DispatchError::Execution { .. } => "execution",
            DispatchError::Kernel(_) => "kernel",
        }
    }
}
