//! Shard scheduler error taxonomy.

use nsk_kernel::{Fact, Symbol, SymbolTable, Term};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ShardError {
    #[error("no factory registered for shard kind {0}")]
    UnknownKind(String),

    #[error("shard {0} not found")]
    NotFound(String),

    #[error("shard {0} cannot be destroyed: {1}")]
    DestroyRefused(String, &'static str),

    #[error("delegation to {kind} failed: {reason}")]
    DelegationFailed { kind: String, reason: String },

    #[error("kernel error: {0}")]
    Kernel(#[from] nsk_kernel::Error),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] nsk_dispatcher::DispatchError),
}

pub type Result<T> = std::result::Result<T, ShardError>;

impl ShardError {
    pub fn to_fact(&self, table: &SymbolTable, shard_id: &str) -> Fact {
        let predicate: Symbol = table.intern("delegation_failed");
        let reason = self.to_string();
        Fact::new(
            predicate,
            vec![Term::Str(shard_id.to_string()), Term::Str(reason)],
        )
    }
}
