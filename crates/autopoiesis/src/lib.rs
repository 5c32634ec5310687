//! Autopoiesis: the system's ability to propose new rules (Feedback Loop)
//! and new tools (Ouroboros/Thunderdome), bounded by a stability score and a
//! fixed state machine so a bad proposal can degrade at most one run rather
//! than the live kernel.

pub mod error;
pub mod feedback_loop;
pub mod ledger;
pub mod ouroboros;
pub mod stability;
pub mod state_machine;
pub mod thunderdome;

pub use error::{AutopoiesisError, Result};
pub use feedback_loop::{generate_and_validate, FeedbackErrorClass, FeedbackOutcome, SessionBudget};
pub use ledger::{DisabledRule, DisabledStage, RuleLedger};
pub use ouroboros::{
    derive_spec, generate_and_harden, static_audit, tool_registered_fact, CompileBackend,
    NullCompileBackend, OuroborosOutcome, RustcCompileBackend, Severity, ToolSpec, Violation,
};
pub use stability::{StabilityScore, StabilityTracker};
pub use state_machine::{
    propose_rule, AutopoiesisRun, HaltReason, NoopSimulation, RuleProposalOutcome, RunLimits,
    SimulationCheck, Stage,
};
pub use thunderdome::{
    default_vectors, harden, run_attacks, AttackHarness, AttackKind, AttackResult, AttackVector,
    Armory, ThunderdomeReport,
};
