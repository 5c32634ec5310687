//! The retained-but-disabled ledger for learned rules autopoiesis rejects.
//!
//! §9's first Open Question: the source contains autopoiesis-learned rules
//! explicitly commented out with "SELF-HEALED" markers rather than deleted.
//! The decision recorded in `DESIGN.md` is to preserve that distinction
//! rather than silently drop a rejected candidate — a rule that fails audit,
//! stratification, or adversarial simulation is appended here with the
//! reason it was disabled, mirroring `core::config`'s `ConfigIssue` pattern
//! of recording rather than discarding problems. The ledger never forgets
//! and never re-enables a rule on its own; a human or a future candidate
//! proposal is the only way a disabled rule's predicate gets another try.

use serde::{Deserialize, Serialize};

/// The stage at which a learned rule was disabled, for grouping and display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisabledStage {
    Audit,
    Simulation,
    Adversarial,
    Commit,
}

impl DisabledStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::Simulation => "simulation",
            Self::Adversarial => "adversarial",
            Self::Commit => "commit",
        }
    }
}

/// One entry: a learned rule that never reached the live program, kept
/// verbatim alongside the reason and stage it was disabled at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledRule {
    pub rule_text: String,
    pub stage: DisabledStage,
    pub reason: String,
    /// Always `true` on insert; the field exists so a future repair pass can
    /// flip it without losing the history of why it was ever disabled.
    pub retained: bool,
}

/// Append-only record of every rule autopoiesis rejected, in insertion
/// order. Never mutates or removes an entry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuleLedger {
    entries: Vec<DisabledRule>,
}

impl RuleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rejected candidate. This is "self-healed" in the source's
    /// vocabulary: the candidate is retained for inspection, not deleted.
    pub fn record_disabled(&mut self, rule_text: impl Into<String>, stage: DisabledStage, reason: impl Into<String>) {
        self.entries.push(DisabledRule {
            rule_text: rule_text.into(),
            stage,
            reason: reason.into(),
            retained: true,
        });
    }

    pub fn entries(&self) -> &[DisabledRule] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries disabled at a given stage, most recent last.
    pub fn at_stage(&self, stage: DisabledStage) -> impl Iterator<Item = &DisabledRule> {
        self.entries.iter().filter(move |e| e.stage == stage)
    }
}
