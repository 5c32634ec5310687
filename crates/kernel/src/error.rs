//! Kernel error taxonomy.
//!
//! Every variant here corresponds to one of the rejectable-before-mutation
//! classes from the error handling design: schema failures never touch live
//! state. `to_fact` turns an error into a ground fact so the rest of the
//! system can reason about a failure the same way it reasons about anything
//! else, per the "errors are first-class facts" propagation policy.

use crate::fact::Fact;
use crate::symbol::SymbolTable;
use crate::term::Term;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("undeclared predicate: {0}")]
    UndeclaredPredicate(String),

    #[error("arity mismatch for {predicate}: expected {expected}, got {got}")]
    ArityMismatch {
        predicate: String,
        expected: usize,
        got: usize,
    },

    #[error("type mismatch for {predicate} argument {index}: expected {expected}, got {got}")]
    TypeMismatch {
        predicate: String,
        index: usize,
        expected: String,
        got: String,
    },

    #[error("{predicate} argument {index} must be one of {allowed:?}, got {got}")]
    EnumValueNotAllowed {
        predicate: String,
        index: usize,
        allowed: Vec<String>,
        got: String,
    },

    #[error("predicate {0} is intensional and cannot be asserted extensionally")]
    AssertIntoIntensional(String),

    #[error("predicate {0} is core-owned; autopoiesis may not author rules for it")]
    CoreOwnedViolation(String),

    #[error("rule is not range-restricted: head variable {0} does not appear in a positive body atom")]
    UnsafeHeadVariable(String),

    #[error("rule is not safe: variable {0} under negation/comparison is never bound by a positive atom")]
    UnboundNegatedVariable(String),

    #[error("program is not stratifiable: negative cycle through {0:?}")]
    NotStratifiable(Vec<String>),

    #[error("snapshot is stale or unknown")]
    UnknownSnapshot,

    #[error("aggregation pipeline error: {0}")]
    Aggregation(String),

    #[error("evaluation panicked and was rolled back: {0}")]
    EvaluationPanic(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify this error into the canonical Feedback Loop error class name
    /// used when building the next, stricter LLM retry prompt.
    pub fn feedback_class(&self) -> &'static str {
        match self {
            Error::Parse(_) => "Parse",
            Error::UndeclaredPredicate(_) => "UndeclaredPredicate",
            Error::ArityMismatch { .. } => "TypeMismatch",
            Error::TypeMismatch { .. } => "TypeMismatch",
            Error::EnumValueNotAllowed { .. } => "TypeMismatch",
            Error::AssertIntoIntensional(_) => "UndeclaredPredicate",
            Error::CoreOwnedViolation(_) => "UndeclaredPredicate",
            Error::UnsafeHeadVariable(_) => "Syntax",
            Error::UnboundNegatedVariable(_) => "UnboundNegation",
            Error::NotStratifiable(_) => "Stratification",
            Error::UnknownSnapshot => "Syntax",
            Error::Aggregation(_) => "Aggregation",
            Error::EvaluationPanic(_) => "Syntax",
        }
    }

    /// Render this error as a ground fact so rules can observe and react to
    /// it (`execution_error(id, stage, reason)` in the dispatcher's vocabulary
    /// follows the same shape).
    pub fn to_fact(&self, table: &SymbolTable, fact_id: &str) -> Fact {
        let predicate = table.intern("kernel_error");
        let class = table.intern(self.feedback_class());
        Fact::new(
            predicate,
            vec![
                Term::Str(fact_id.to_string()),
                Term::Atom(class),
                Term::Str(self.to_string()),
            ],
        )
    }
}
