//! The bounded state machine driving one autopoiesis run through
//! `proposal → audit → simulation → adversarial → commit`, shared by rule
//! proposals (this module's `propose_rule`) and tool proposals (wired by the
//! caller from `ouroboros`/`thunderdome`, which need a `Shard`-driven
//! Nemesis this crate has no dependency on).

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use nsk_kernel::Kernel;
use nsk_transducers::LlmClient;
use tracing::warn;

use crate::error::{AutopoiesisError, Result};
use crate::feedback_loop::{self, SessionBudget};
use crate::ledger::{DisabledStage, RuleLedger};
use crate::stability::StabilityTracker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Proposal,
    Audit,
    Simulation,
    Adversarial,
    Commit,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HaltReason {
    MaxIterationsExceeded,
    MaxRetriesExceeded,
    Stagnation,
    DegradingStability,
    Rejected(Stage, String),
}

fn halt_to_error(reason: HaltReason) -> AutopoiesisError {
    match reason {
        HaltReason::MaxIterationsExceeded => AutopoiesisError::MaxIterationsExceeded(0),
        HaltReason::MaxRetriesExceeded => AutopoiesisError::RetryBudgetExhausted { budget: 0 },
        HaltReason::Stagnation => AutopoiesisError::Stagnation,
        HaltReason::DegradingStability => AutopoiesisError::StabilityRegression { current: 0.0, proposed: 0.0 },
        HaltReason::Rejected(_, detail) => AutopoiesisError::SchemaViolation(detail),
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RunLimits {
    pub max_iterations: u32,
    pub max_retries: u32,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self { max_iterations: 10, max_retries: 20 }
    }
}

/// Cross-iteration bookkeeping for one autopoiesis session: iteration count,
/// the hashes of every candidate seen (for stagnation detection), and a
/// running stability score.
pub struct AutopoiesisRun {
    limits: RunLimits,
    iterations: u32,
    seen_hashes: HashSet<u64>,
    stability: StabilityTracker,
    ledger: RuleLedger,
}

impl AutopoiesisRun {
    pub fn new(limits: RunLimits) -> Self {
        Self {
            limits,
            iterations: 0,
            seen_hashes: HashSet::new(),
            stability: StabilityTracker::new(),
            ledger: RuleLedger::new(),
        }
    }

    pub fn stability(&self) -> f64 {
        self.stability.current().value()
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// The retained-but-disabled ledger (§9 Open Question): every candidate
    /// this run rejected, kept with its reason rather than dropped silently.
    pub fn ledger(&self) -> &RuleLedger {
        &self.ledger
    }

    /// Record one candidate's outcome. Returns a halt reason if the run must
    /// stop here; `None` means the caller may proceed to commit.
    pub fn advance(&mut self, candidate_hash: u64, panicked: bool, attempts: u32) -> Option<HaltReason> {
        self.iterations += 1;
        if self.iterations > self.limits.max_iterations {
            return Some(HaltReason::MaxIterationsExceeded);
        }
        if !self.seen_hashes.insert(candidate_hash) {
            return Some(HaltReason::Stagnation);
        }
        if !self.stability.record(panicked, attempts) {
            return Some(HaltReason::DegradingStability);
        }
        None
    }

    pub fn retries_budget_exceeded(&self, used: u32) -> bool {
        used >= self.limits.max_retries
    }
}

/// Retain a rejected candidate rather than drop it (§9's "SELF-HEALED"
/// marker, preserved as structured data instead of a source comment).
fn self_heal(run: &mut AutopoiesisRun, rule_text: &str, stage: DisabledStage, reason: impl Into<String>) {
    let reason = reason.into();
    warn!(stage = stage.as_str(), %reason, "learned rule self-healed: retained but disabled");
    run.ledger.record_disabled(rule_text, stage, reason);
}

fn ledger_stage(stage: Stage) -> DisabledStage {
    match stage {
        Stage::Proposal | Stage::Audit => DisabledStage::Audit,
        Stage::Simulation => DisabledStage::Simulation,
        Stage::Adversarial => DisabledStage::Adversarial,
        Stage::Commit => DisabledStage::Commit,
    }
}

fn content_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// A caller-supplied precognitive check run between audit and commit — in
/// practice the Dreamer (`nsk-dispatcher`), which this crate deliberately
/// has no hard dependency on so rule proposals stay usable without pulling
/// in the effect-dispatch stack.
pub trait SimulationCheck: Send + Sync {
    fn check(&self, kernel: &Kernel, rule_text: &str) -> std::result::Result<(), String>;
}

pub struct NoopSimulation;

impl SimulationCheck for NoopSimulation {
    fn check(&self, _kernel: &Kernel, _rule_text: &str) -> std::result::Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RuleProposalOutcome {
    pub rule_text: String,
    pub attempts: u32,
    pub stability: f64,
}

/// Drive one rule proposal through the full pipeline: Feedback Loop
/// (proposal + pre-validate/quick-fix/sandbox-compile, which together serve
/// as audit), the injected simulation check, and — only if every stage
/// clears and the run's stability bookkeeping allows it — commit via
/// `hot_load_rule`.
#[allow(clippy::too_many_arguments)]
pub async fn propose_rule(
    llm: &dyn LlmClient,
    kernel: &mut Kernel,
    system_prompt: &str,
    user_prompt: &str,
    domain: &str,
    known_atoms: &[String],
    per_rule_cap: u32,
    session: &mut SessionBudget,
    run: &mut AutopoiesisRun,
    simulation: &dyn SimulationCheck,
) -> Result<RuleProposalOutcome> {
    let outcome = feedback_loop::generate_and_validate(
        llm, kernel, system_prompt, user_prompt, domain, known_atoms, per_rule_cap, session,
    )
    .await?;

    let Some(rule_text) = outcome.rule else {
        let reason = outcome
            .errors
            .last()
            .map(|e| e.as_str().to_string())
            .unwrap_or_else(|| "feedback loop exhausted its retry budget".to_string());
        self_heal(run, user_prompt, DisabledStage::Audit, reason);
        return Err(AutopoiesisError::RetryBudgetExhausted { budget: per_rule_cap });
    };

    let sim_result = simulation.check(kernel, &rule_text);
    let panicked = sim_result.is_err();
    let hash = content_hash(&rule_text);

    if let Some(halt) = run.advance(hash, panicked, outcome.attempts) {
        if let HaltReason::Rejected(stage, ref reason) = halt {
            self_heal(run, &rule_text, ledger_stage(stage), reason.clone());
        } else if panicked {
            self_heal(run, &rule_text, DisabledStage::Simulation, "degraded stability after panic");
        }
        return Err(halt_to_error(halt));
    }
    if let Err(reason) = sim_result {
        self_heal(run, &rule_text, DisabledStage::Simulation, reason.clone());
        return Err(halt_to_error(HaltReason::Rejected(Stage::Simulation, reason)));
    }

    kernel.hot_load_rule(&rule_text)?;
    Ok(RuleProposalOutcome {
        rule_text,
        attempts: outcome.attempts,
        stability: run.stability(),
    })
}
