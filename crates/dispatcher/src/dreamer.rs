//! The Dreamer: precognitive simulation of an action's effects before it is
//! ever actually performed.
//!
//! `simulate` clones the kernel, asserts the action's *projected* effects as
//! ground facts, brings the clone to fixpoint, and checks whether that
//! derives `panic_state(_)`. The clone (and everything asserted into it) is
//! discarded unconditionally — live state is never touched, win or lose.

use nsk_kernel::{Fact, Kernel, Term};
use tracing::warn;

use crate::action::ActionRequest;
use crate::policy::{DangerousPatterns, ProtectedPrefixes};

#[derive(Debug, Clone)]
pub struct DreamResult {
    pub projected_facts: Vec<Fact>,
    pub unsafe_: bool,
    pub reason: Option<String>,
}

impl DreamResult {
    fn safe(projected_facts: Vec<Fact>) -> Self {
        Self {
            projected_facts,
            unsafe_: false,
            reason: None,
        }
    }

    fn unsafe_with(projected_facts: Vec<Fact>, reason: String) -> Self {
        Self {
            projected_facts,
            unsafe_: true,
            reason: Some(reason),
        }
    }
}

/// The rule text the Dreamer's `panic_state` detection depends on. A live
/// kernel must have these loaded (see `AgentState::boot`) before `simulate`
/// can ever find anything unsafe — `panic_state` is not core-owned (see
/// `nsk_kernel::schema::bootstrap_schema`'s comment) precisely so these can
/// be hot-loaded the same way any other rule is.
pub fn bootstrap_panic_rules() -> &'static [&'static str] {
    &[
        "panic_state(R) :- projected_fact(/exec_danger, R).",
        "panic_state(R) :- projected_fact(/critical_path_hit, R).",
    ]
}

pub struct Dreamer {
    protected: ProtectedPrefixes,
    dangerous: DangerousPatterns,
}

impl Default for Dreamer {
    fn default() -> Self {
        Self {
            protected: ProtectedPrefixes::default(),
            dangerous: DangerousPatterns::default_set(),
        }
    }
}

impl Dreamer {
    pub fn new(protected: ProtectedPrefixes, dangerous: DangerousPatterns) -> Self {
        Self { protected, dangerous }
    }

    /// Project `request`'s anticipated effects into a kernel snapshot,
    /// re-evaluate, and report whether the projection derives `panic_state`.
    pub fn simulate(&self, kernel: &Kernel, request: &ActionRequest) -> DreamResult {
        let mut clone = kernel.clone();
        let projected = self.project(&clone, request);

        for fact in &projected {
            // Projection facts are best-effort: a schema that rejects one
            // (e.g. an undeclared arity) should not crash the dream, it
            // should just leave that particular signal unobserved.
            let _ = clone.assert(fact.clone());
        }

        if let Err(e) = clone.evaluate() {
            warn!(error = %e, action = %request.kind, "dreamer evaluation failed, treating as unsafe");
            return DreamResult::unsafe_with(projected, format!("evaluation failed: {e}"));
        }

        let panic_state = clone.symbols.intern("panic_state");
        let panics = clone.query(panic_state);
        if let Some(first) = panics.first() {
            let reason = match first.args.first() {
                Some(Term::Str(s)) => s.clone(),
                _ => "panic_state derived with no reason argument".to_string(),
            };
            return DreamResult::unsafe_with(projected, reason);
        }

        DreamResult::safe(projected)
    }

    fn project(&self, kernel: &Kernel, request: &ActionRequest) -> Vec<Fact> {
        let mut facts = Vec::new();
        let projected_fact = kernel.symbols.intern("projected_fact");

        match request.kind.as_str() {
            "edit_file" | "write_file" | "delete_file" => {
                if let Some(path) = request.string_arg(0) {
                    let modified = kernel.symbols.intern("modified");
                    facts.push(Fact::new(
                        projected_fact,
                        vec![Term::Atom(modified), Term::Str(path.to_string())],
                    ));
                    if self.protected.hits(path) {
                        let critical = kernel.symbols.intern("critical_path_hit");
                        facts.push(Fact::new(
                            projected_fact,
                            vec![Term::Atom(critical), Term::Str(path.to_string())],
                        ));
                    }
                }
            }
            "shell_exec" => {
                if let Some(cmd) = request.string_arg(0) {
                    if let Some(name) = self.dangerous.first_match(cmd) {
                        let exec_danger = kernel.symbols.intern("exec_danger");
                        facts.push(Fact::new(
                            projected_fact,
                            vec![Term::Atom(exec_danger), Term::Str(format!("{name}: {cmd}"))],
                        ));
                    }
                    if self.protected.hits(cmd) {
                        let critical = kernel.symbols.intern("critical_path_hit");
                        facts.push(Fact::new(
                            projected_fact,
                            vec![Term::Atom(critical), Term::Str(cmd.to_string())],
                        ));
                    }
                }
            }
            _ => {}
        }

        facts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsk_kernel::{bootstrap_schema, SymbolTable};

    fn kernel_with_panic_rule() -> Kernel {
        let table = SymbolTable::new();
        let schema = bootstrap_schema(&table);
        let mut kernel = Kernel::new(table, schema);
        for rule in bootstrap_panic_rules() {
            kernel.hot_load_rule(rule).unwrap();
        }
        kernel
    }

    #[test]
    fn dangerous_shell_command_is_unsafe() {
        let kernel = kernel_with_panic_rule();
        let dreamer = Dreamer::default();
        let request = ActionRequest {
            id: "a1".into(),
            kind: "shell_exec".into(),
            args: vec![Term::Str("rm -rf /".into())],
        };
        let result = dreamer.simulate(&kernel, &request);
        assert!(result.unsafe_);
        assert!(result.reason.unwrap().contains("rm -rf /"));
    }

    #[test]
    fn benign_shell_command_is_safe() {
        let kernel = kernel_with_panic_rule();
        let dreamer = Dreamer::default();
        let request = ActionRequest {
            id: "a2".into(),
            kind: "shell_exec".into(),
            args: vec![Term::Str("ls -la".into())],
        };
        let result = dreamer.simulate(&kernel, &request);
        assert!(!result.unsafe_);
    }

    #[test]
    fn edit_touching_protected_prefix_is_unsafe() {
        let kernel = kernel_with_panic_rule();
        let dreamer = Dreamer::default();
        let request = ActionRequest {
            id: "a3".into(),
            kind: "edit_file".into(),
            args: vec![Term::Str(".git/config".into())],
        };
        let result = dreamer.simulate(&kernel, &request);
        assert!(result.unsafe_);
    }

    #[test]
    fn dream_never_mutates_live_kernel() {
        let kernel = kernel_with_panic_rule();
        let before = kernel.query(kernel.symbols.intern("projected_fact"));
        let dreamer = Dreamer::default();
        let request = ActionRequest {
            id: "a4".into(),
            kind: "shell_exec".into(),
            args: vec![Term::Str("rm -rf /".into())],
        };
        dreamer.simulate(&kernel, &request);
        let after = kernel.query(kernel.symbols.intern("projected_fact"));
        assert_eq!(before, after);
    }
}
