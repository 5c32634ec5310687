//! The JIT Context Compiler.
//!
//! Assembles a minimal-but-sufficient prompt per LLM call: embed the task
//! context, recall candidate atoms by vector similarity, assert them into the
//! kernel so rules can derive dependency satisfaction and conflicts, resolve
//! conflicts and budgets, and concatenate what survives in declared category
//! order with the Piggyback protocol directive appended.

pub mod atom;
pub mod compiler;
pub mod error;
pub mod retrieval;

pub use atom::{Atom, AtomStore, Category};
pub use compiler::{compile, CompiledPrompt, PIGGYBACK_DIRECTIVE};
pub use error::{ContextError, Result};
pub use retrieval::{AtomStoreRecall, ContextQuery, EmbeddingService, HashEmbeddingService, VectorRecall};
