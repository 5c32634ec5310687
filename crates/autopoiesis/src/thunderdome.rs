//! Thunderdome: adversarial testing of a candidate tool by a Nemesis shard.
//! Successful attacks persist into an Armory for regression testing on
//! future candidates; a tool that survives every attack in the current
//! Armory is marked `battle_hardened`.

use async_trait::async_trait;
use std::path::Path;

use crate::ouroboros::OuroborosOutcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttackKind {
    NilInput,
    BoundaryValue,
    ResourceExhaustion,
    ConcurrentRace,
    MalformedEncoding,
}

#[derive(Clone, Debug)]
pub struct AttackVector {
    pub name: String,
    pub kind: AttackKind,
    pub payload: String,
}

/// The fixed starter set every Armory begins with, per §4.5.2's enumerated
/// attack families.
pub fn default_vectors() -> Vec<AttackVector> {
    vec![
        AttackVector { name: "nil-input".into(), kind: AttackKind::NilInput, payload: String::new() },
        AttackVector { name: "max-i64-boundary".into(), kind: AttackKind::BoundaryValue, payload: i64::MAX.to_string() },
        AttackVector { name: "min-i64-boundary".into(), kind: AttackKind::BoundaryValue, payload: i64::MIN.to_string() },
        AttackVector { name: "oversized-payload".into(), kind: AttackKind::ResourceExhaustion, payload: "a".repeat(1 << 20) },
        AttackVector { name: "concurrent-double-invoke".into(), kind: AttackKind::ConcurrentRace, payload: String::new() },
        AttackVector { name: "invalid-utf8-bytes".into(), kind: AttackKind::MalformedEncoding, payload: "\u{FFFD}\u{FFFD}".into() },
    ]
}

#[derive(Clone, Debug, Default)]
pub struct AttackResult {
    pub panicked: bool,
    pub violated_invariant: bool,
    /// The harness itself failed to run the attack (timeout from test-rig
    /// contention, missing scratch disk, …) rather than the candidate
    /// failing it. §9's second Open Question: this is the recommended
    /// default policy — environmental failure is retried, never counted as
    /// a tool defect.
    pub environmental: bool,
    pub detail: String,
}

impl AttackResult {
    pub fn survived(&self) -> bool {
        !self.panicked && !self.violated_invariant
    }
}

/// Runs an attack vector against a compiled candidate under CPU/memory/
/// timeout limits. The Nemesis shard drives this through its `shell_exec`
/// tool in production; tests substitute a deterministic double.
#[async_trait]
pub trait AttackHarness: Send + Sync {
    async fn run_attack(&self, artifact: &Path, vector: &AttackVector) -> AttackResult;
}

/// Regression set: attacks that have previously broken a candidate get
/// replayed against every future one.
#[derive(Clone, Debug, Default)]
pub struct Armory {
    vectors: Vec<AttackVector>,
}

impl Armory {
    pub fn seeded() -> Self {
        Self { vectors: default_vectors() }
    }

    pub fn add(&mut self, vector: AttackVector) {
        self.vectors.push(vector);
    }

    pub fn vectors(&self) -> &[AttackVector] {
        &self.vectors
    }
}

#[derive(Debug, Clone)]
pub struct ThunderdomeReport {
    pub survived: bool,
    pub failures: Vec<AttackVector>,
    /// Vectors whose harness run stayed `environmental` after the retry —
    /// neither a confirmed defeat nor a confirmed survival. Reported
    /// separately so the caller does not silently treat them as either.
    pub inconclusive: Vec<AttackVector>,
}

/// Run every vector in the armory against the candidate artifact. A tool
/// that panics or violates an invariant under a *successfully executed*
/// attack is rejected outright; an attack the harness itself could not run
/// (`environmental`) is retried once before being recorded as inconclusive
/// rather than counted against the candidate. The failing vectors are
/// returned so the caller can persist the ones not already in the armory.
pub async fn run_attacks(
    artifact: &Path,
    armory: &Armory,
    harness: &dyn AttackHarness,
) -> ThunderdomeReport {
    let mut failures = Vec::new();
    let mut inconclusive = Vec::new();
    for vector in armory.vectors() {
        let mut result = harness.run_attack(artifact, vector).await;
        if result.environmental {
            result = harness.run_attack(artifact, vector).await;
        }
        if result.environmental {
            inconclusive.push(vector.clone());
        } else if !result.survived() {
            failures.push(vector.clone());
        }
    }
    ThunderdomeReport {
        survived: failures.is_empty(),
        failures,
        inconclusive,
    }
}

/// Mark an Ouroboros candidate `battle_hardened` once it has survived the
/// full armory with every vector conclusively resolved; otherwise leave it
/// as-is so `tool_registered_fact` keeps refusing to emit a registration
/// fact for it. A report with no confirmed defeats but an unresolved
/// `inconclusive` vector is neither committed nor rejected — the caller
/// reruns Thunderdome rather than treating environmental noise as either
/// outcome.
pub fn harden(outcome: &mut OuroborosOutcome, report: &ThunderdomeReport) {
    outcome.battle_hardened = report.survived && report.inconclusive.is_empty();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysSurvives;

    #[async_trait]
    impl AttackHarness for AlwaysSurvives {
        async fn run_attack(&self, _artifact: &Path, _vector: &AttackVector) -> AttackResult {
            AttackResult::default()
        }
    }

    struct PanicsOnBoundary {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AttackHarness for PanicsOnBoundary {
        async fn run_attack(&self, _artifact: &Path, vector: &AttackVector) -> AttackResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if vector.kind == AttackKind::BoundaryValue {
                AttackResult { panicked: true, violated_invariant: false, detail: "overflow".into() }
            } else {
                AttackResult::default()
            }
        }
    }

    #[tokio::test]
    async fn survives_every_vector_marks_battle_hardened() {
        let armory = Armory::seeded();
        let report = run_attacks(Path::new("/tmp/candidate"), &armory, &AlwaysSurvives).await;
        assert!(report.survived);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn a_panic_on_any_vector_fails_the_whole_report() {
        let armory = Armory::seeded();
        let harness = PanicsOnBoundary { calls: AtomicUsize::new(0) };
        let report = run_attacks(Path::new("/tmp/candidate"), &armory, &harness).await;
        assert!(!report.survived);
        assert!(report.failures.iter().any(|v| v.kind == AttackKind::BoundaryValue));
    }

    struct EnvironmentalOnceThenSurvives {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AttackHarness for EnvironmentalOnceThenSurvives {
        async fn run_attack(&self, _artifact: &Path, _vector: &AttackVector) -> AttackResult {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                AttackResult { environmental: true, detail: "scratch disk unavailable".into(), ..Default::default() }
            } else {
                AttackResult::default()
            }
        }
    }

    #[tokio::test]
    async fn an_environmental_failure_is_retried_and_does_not_count_as_a_defeat() {
        let mut armory = Armory::default();
        armory.add(AttackVector { name: "v".into(), kind: AttackKind::NilInput, payload: String::new() });
        let harness = EnvironmentalOnceThenSurvives { calls: AtomicUsize::new(0) };
        let report = run_attacks(Path::new("/tmp/candidate"), &armory, &harness).await;
        assert!(report.survived);
        assert!(report.failures.is_empty());
        assert!(report.inconclusive.is_empty());
    }

    struct AlwaysEnvironmental;

    #[async_trait]
    impl AttackHarness for AlwaysEnvironmental {
        async fn run_attack(&self, _artifact: &Path, _vector: &AttackVector) -> AttackResult {
            AttackResult { environmental: true, detail: "timeout".into(), ..Default::default() }
        }
    }

    #[tokio::test]
    async fn a_persistently_environmental_attack_is_inconclusive_not_a_defeat() {
        let mut armory = Armory::default();
        armory.add(AttackVector { name: "v".into(), kind: AttackKind::NilInput, payload: String::new() });
        let report = run_attacks(Path::new("/tmp/candidate"), &armory, &AlwaysEnvironmental).await;
        assert!(report.survived);
        assert!(report.failures.is_empty());
        assert_eq!(report.inconclusive.len(), 1);
    }

    #[test]
    fn harden_only_sets_battle_hardened_when_report_survived() {
        let mut outcome = OuroborosOutcome {
            spec: crate::ouroboros::ToolSpec {
                name: "t".into(),
                input_shape: "bytes".into(),
                output_shape: "bytes".into(),
                capability: "text_transform".into(),
            },
            artifact_path: std::path::PathBuf::from("/tmp/t"),
            violations: vec![],
            battle_hardened: false,
        };
        harden(&mut outcome, &ThunderdomeReport { survived: false, failures: vec![], inconclusive: vec![] });
        assert!(!outcome.battle_hardened);
        harden(&mut outcome, &ThunderdomeReport { survived: true, failures: vec![], inconclusive: vec![] });
        assert!(outcome.battle_hardened);
    }

    #[test]
    fn harden_withholds_battle_hardened_while_a_vector_is_inconclusive() {
        let mut outcome = OuroborosOutcome {
            spec: crate::ouroboros::ToolSpec {
                name: "t".into(),
                input_shape: "bytes".into(),
                output_shape: "bytes".into(),
                capability: "text_transform".into(),
            },
            artifact_path: std::path::PathBuf::from("/tmp/t"),
            violations: vec![],
            battle_hardened: false,
        };
        let stuck = AttackVector { name: "v".into(), kind: AttackKind::NilInput, payload: String::new() };
        harden(&mut outcome, &ThunderdomeReport { survived: true, failures: vec![], inconclusive: vec![stuck] });
        assert!(!outcome.battle_hardened);
    }
}
