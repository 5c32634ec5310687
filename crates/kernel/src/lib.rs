//! The Deductive Kernel.
//!
//! Ground truth for the whole agent: a fact store partitioned by stratum, a
//! stratified-negation rule engine with semi-naive (differential) bottom-up
//! evaluation, schema-aware validation, and a sandboxed hot-load path for
//! rules proposed by autopoiesis.
//!
//! Evaluation never performs I/O. Anything that needs the outside world is a
//! virtual predicate resolved by the dispatcher crate, not by this one.

pub mod differential;
pub mod engine;
pub mod error;
pub mod fact;
pub mod parser;
pub mod rule;
pub mod schema;
pub mod stratify;
pub mod store;
pub mod symbol;
pub mod term;

pub use engine::{Kernel, ValidationReport};
pub use error::{Error, Result};
pub use fact::Fact;
pub use rule::{AggFn, AggPipeline, AtomPattern, BodyLiteral, CompOp, Rule};
pub use schema::{bootstrap_rules, bootstrap_schema, Owner, PredicateDecl, Schema, Visibility};
pub use store::Snapshot;
pub use stratify::Stratification;
pub use symbol::{Symbol, SymbolTable};
pub use term::{Term, TermType};
