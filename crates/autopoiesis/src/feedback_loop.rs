//! The Feedback Loop: `generate_and_validate` drives an LLM toward a rule
//! that the kernel will actually accept, tightening the prompt each attempt
//! rather than giving up after the first malformed reply.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use nsk_kernel::Kernel;
use nsk_transducers::LlmClient;

use crate::error::{AutopoiesisError, Result};

/// The ten canonical failure classes enumerated by the syntax reminder.
/// `AtomString`, `MissingPeriod`, and `PrologNegation` are only ever raised
/// by the regex pre-validate pass below; the kernel itself never produces
/// them because `hot_load_rule` only sees post-quick-fix text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackErrorClass {
    Parse,
    AtomString,
    Aggregation,
    MissingPeriod,
    UnboundNegation,
    UndeclaredPredicate,
    Stratification,
    TypeMismatch,
    PrologNegation,
    Syntax,
}

impl FeedbackErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "Parse",
            Self::AtomString => "AtomString",
            Self::Aggregation => "Aggregation",
            Self::MissingPeriod => "MissingPeriod",
            Self::UnboundNegation => "UnboundNegation",
            Self::UndeclaredPredicate => "UndeclaredPredicate",
            Self::Stratification => "Stratification",
            Self::TypeMismatch => "TypeMismatch",
            Self::PrologNegation => "PrologNegation",
            Self::Syntax => "Syntax",
        }
    }

    fn from_kernel_error(e: &nsk_kernel::Error) -> Self {
        match e.feedback_class() {
            "Parse" => Self::Parse,
            "UndeclaredPredicate" => Self::UndeclaredPredicate,
            "TypeMismatch" => Self::TypeMismatch,
            "UnboundNegation" => Self::UnboundNegation,
            "Stratification" => Self::Stratification,
            "Aggregation" => Self::Aggregation,
            _ => Self::Syntax,
        }
    }

    /// The WRONG/CORRECT pair shown to the LLM once an error class has
    /// already been observed once this rule (attempt 2's stricter prompt).
    fn example(&self) -> &'static str {
        match self {
            Self::PrologNegation => {
                "WRONG: blocked(X) :- action(X), \\+permitted(X).\nCORRECT: blocked(X) :- action(X), !permitted(X)."
            }
            Self::AtomString => {
                "WRONG: active_strategy(\"implement\").\nCORRECT: active_strategy(/implement)."
            }
            Self::MissingPeriod => {
                "WRONG: blocked(X) :- action(X)\nCORRECT: blocked(X) :- action(X)."
            }
            Self::Aggregation => {
                "WRONG: ... |> SELECT COUNT(Id) GROUP BY Tag\nCORRECT: ... |> do fn:group_by(Tag), let N = fn:count(Id)."
            }
            Self::UnboundNegation => {
                "WRONG: blocked(X) :- !permitted(X).\nCORRECT: blocked(X) :- action(X), !permitted(X)."
            }
            Self::UndeclaredPredicate => {
                "Only use predicates from the declared list in this prompt; do not invent new predicate names."
            }
            Self::Stratification => {
                "A predicate may not depend negatively on itself, even through other rules. Remove the cycle."
            }
            Self::TypeMismatch => "Check each argument's declared type and literal kind match exactly.",
            Self::Parse | Self::Syntax => {
                "Reply with exactly one rule of the form Head(Args) :- Body1, Body2.  nothing else."
            }
        }
    }
}

fn prolog_negation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\\+").unwrap())
}

fn sql_aggregation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(SELECT|GROUP BY)\b").unwrap())
}

fn atom_string_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""[a-z][a-z_]*""#).unwrap())
}

/// Group 1 captures a `fn` prefix when present, so callers can tell a real
/// `fn:count(...)` call apart from a stray `:name` colon-atom typo — the
/// `regex` crate has no lookbehind, so this is done with an optional group
/// instead of an assertion.
fn colon_atom_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(fn)?:([a-z][a-zA-Z0-9_]*)").unwrap())
}

fn is_stray_colon_atom(text: &str) -> bool {
    colon_atom_re()
        .captures_iter(text)
        .any(|caps| caps.get(1).is_none())
}

fn struct_dot_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\.[A-Za-z_][A-Za-z0-9_]*\b").unwrap())
}

fn null_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(NULL|CASE\s+WHEN)\b").unwrap())
}

fn agg_fn_casing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)fn:(count|sum|min|max|collect)").unwrap())
}

/// Fast regex pass over candidate rule text for the nine listed failure
/// patterns. Does not consult the kernel; purely lexical.
pub fn pre_validate(text: &str) -> Vec<FeedbackErrorClass> {
    let mut found = Vec::new();
    if prolog_negation_re().is_match(text) {
        found.push(FeedbackErrorClass::PrologNegation);
    }
    if sql_aggregation_re().is_match(text) {
        found.push(FeedbackErrorClass::Aggregation);
    }
    if atom_string_re().is_match(text) {
        found.push(FeedbackErrorClass::AtomString);
    }
    if !text.trim_end().ends_with('.') {
        found.push(FeedbackErrorClass::MissingPeriod);
    }
    if is_stray_colon_atom(text) || struct_dot_re().is_match(text) || null_case_re().is_match(text) {
        found.push(FeedbackErrorClass::Syntax);
    }
    if unbound_negated_var(text) {
        found.push(FeedbackErrorClass::UnboundNegation);
    }
    found
}

/// Heuristic: a variable appearing only inside a negated atom, never inside
/// a positive one, is almost certainly unbound. The kernel's own
/// `check_safety` is the authority; this just lets the pre-validate pass
/// flag the common case before spending a sandbox compile on it.
fn unbound_negated_var(text: &str) -> bool {
    static NEG: OnceLock<Regex> = OnceLock::new();
    static POS: OnceLock<Regex> = OnceLock::new();
    static VAR: OnceLock<Regex> = OnceLock::new();
    let neg_re = NEG.get_or_init(|| Regex::new(r"!\s*[a-z_][a-zA-Z0-9_]*\(([^)]*)\)").unwrap());
    let pos_re = POS.get_or_init(|| Regex::new(r"(?:^|[,(])\s*[a-z_][a-zA-Z0-9_]*\(([^)]*)\)").unwrap());
    let var_re = VAR.get_or_init(|| Regex::new(r"[A-Z_][A-Za-z0-9_]*").unwrap());

    let mut positive_vars = std::collections::HashSet::new();
    for caps in pos_re.captures_iter(text) {
        for m in var_re.find_iter(&caps[1]) {
            positive_vars.insert(m.as_str().to_string());
        }
    }
    for caps in neg_re.captures_iter(text) {
        for m in var_re.find_iter(&caps[1]) {
            if !positive_vars.contains(m.as_str()) {
                return true;
            }
        }
    }
    false
}

/// Deterministic auto-rewrites that never change a rule's intent, only its
/// surface syntax: swap Prolog negation, normalize aggregation function
/// casing, and promote known enum-like strings to atom literals.
pub fn quick_fix(text: &str, known_atoms: &[String]) -> (String, bool) {
    let mut out = text.to_string();
    let mut changed = false;

    if prolog_negation_re().is_match(&out) {
        out = prolog_negation_re().replace_all(&out, "!").to_string();
        changed = true;
    }

    if agg_fn_casing_re().is_match(&out) {
        let lowered = agg_fn_casing_re()
            .replace_all(&out, |caps: &regex::Captures| format!("fn:{}", caps[1].to_lowercase()))
            .to_string();
        if lowered != out {
            changed = true;
        }
        out = lowered;
    }

    for atom in known_atoms {
        let quoted = format!("\"{atom}\"");
        if out.contains(&quoted) {
            out = out.replace(&quoted, &format!("/{atom}"));
            changed = true;
        }
    }

    (out, changed)
}

/// Structural fixes for known syntactic equivalences: append a missing
/// trailing period, promote `:name` to `/name`.
pub fn full_sanitize(text: &str) -> String {
    let mut out = colon_atom_re()
        .replace_all(text, |caps: &regex::Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                format!("/{}", &caps[2])
            }
        })
        .to_string();
    let trimmed = out.trim_end();
    if !trimmed.ends_with('.') {
        out = format!("{trimmed}.");
    } else {
        out = trimmed.to_string();
    }
    out
}

/// Pull the candidate rule text out of a reply that may carry a `RULE:`
/// prefix, a fenced code block, or prose before/after the rule itself.
pub fn extract_rule(raw: &str) -> Option<String> {
    static RULE_LINE: OnceLock<Regex> = OnceLock::new();
    let re = RULE_LINE.get_or_init(|| {
        Regex::new(r"(?m)^[A-Za-z_][A-Za-z0-9_]*\([^\n]*:-[^\n]*\.\s*$").unwrap()
    });

    let unfenced = strip_fence(raw);
    let stripped = unfenced.trim().strip_prefix("RULE:").unwrap_or(&unfenced).trim();

    if let Some(m) = re.find(stripped) {
        return Some(m.as_str().trim().to_string());
    }
    // Fall back: a single line that at least looks like `head(...) :- ...`
    for line in stripped.lines() {
        let line = line.trim();
        if line.contains(":-") && line.contains('(') {
            return Some(line.to_string());
        }
    }
    None
}

fn strip_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.trim_start_matches(|c: char| c.is_alphabetic());
        if let Some(end) = rest.rfind("```") {
            return rest[..end].trim().to_string();
        }
    }
    trimmed.to_string()
}

#[derive(Debug, Clone)]
pub struct FeedbackOutcome {
    pub rule: Option<String>,
    pub valid: bool,
    pub attempts: u32,
    pub errors: Vec<FeedbackErrorClass>,
    pub auto_fixed: bool,
}

/// Tracks total LLM retries spent across an entire autopoiesis session, cut
/// across however many individual rules get proposed.
#[derive(Debug, Clone)]
pub struct SessionBudget {
    cap: u32,
    used: u32,
}

impl SessionBudget {
    pub fn new(cap: u32) -> Self {
        Self { cap, used: 0 }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    fn consume(&mut self) -> Result<()> {
        if self.used >= self.cap {
            return Err(AutopoiesisError::SessionBudgetExhausted { budget: self.cap });
        }
        self.used += 1;
        Ok(())
    }
}

impl Default for SessionBudget {
    fn default() -> Self {
        Self::new(20)
    }
}

fn build_prompt(base: &str, domain: &str, known_predicates: &[String], attempt: u32, last_errors: &[FeedbackErrorClass]) -> String {
    let mut prompt = format!(
        "{base}\n\nDomain: {domain}\nDeclared predicates available: {}\n",
        known_predicates.join(", ")
    );
    prompt.push_str(
        "Syntax reminder: atoms are written /name, never as quoted strings. Negation is `!atom(...)`, never `\\+atom(...)`. \
         Every statement ends with a period. Aggregation uses `|> do fn:group_by(Vars), let N = fn:count(V).`, never SQL syntax.\n",
    );
    if let Some(last) = last_errors.last() {
        prompt.push_str("Your previous attempt failed with: ");
        prompt.push_str(last.as_str());
        prompt.push('\n');
        prompt.push_str(last.example());
        prompt.push('\n');
    }
    if attempt >= 3 {
        prompt.push_str(&format!(
            "This is your final attempt. Restrict yourself to these predicates only: {}. \
             Prefer the simplest rule that could possibly satisfy the request.\n",
            known_predicates.join(", ")
        ));
    }
    prompt
}

/// Drive the LLM toward a rule the kernel accepts, per §4.5.1's seven
/// phases. `per_rule_cap` bounds attempts for this one rule; `session`
/// tracks the cross-rule ceiling on total retries.
pub async fn generate_and_validate(
    llm: &dyn LlmClient,
    kernel: &Kernel,
    system_prompt: &str,
    user_prompt: &str,
    domain: &str,
    known_atoms: &[String],
    per_rule_cap: u32,
    session: &mut SessionBudget,
) -> Result<FeedbackOutcome> {
    let known_predicates: Vec<String> = kernel
        .get_declared_predicates()
        .iter()
        .map(|d| kernel.symbols.resolve(d.predicate).to_string())
        .collect();

    let mut errors = Vec::new();
    let mut auto_fixed = false;

    for attempt in 1..=per_rule_cap.max(1) {
        session.consume()?;
        let prompt = build_prompt(user_prompt, domain, &known_predicates, attempt, &errors);
        let raw = llm
            .complete(system_prompt, &prompt)
            .await
            .map_err(|e| AutopoiesisError::Llm(e.to_string()))?;

        let Some(candidate) = extract_rule(&raw) else {
            warn!(attempt, "feedback loop could not extract a rule from the reply");
            errors.push(FeedbackErrorClass::Parse);
            continue;
        };

        let mut text = candidate;
        let pre_issues = pre_validate(&text);
        if !pre_issues.is_empty() {
            let (fixed, changed) = quick_fix(&text, known_atoms);
            text = full_sanitize(&fixed);
            auto_fixed |= changed || text != fixed;
        }

        let report = kernel.sandbox_validate(&text);
        if report.ok {
            info!(attempt, auto_fixed, "feedback loop produced a sandbox-valid rule");
            return Ok(FeedbackOutcome {
                rule: Some(text),
                valid: true,
                attempts: attempt,
                errors,
                auto_fixed,
            });
        }
        for e in &report.errors {
            errors.push(FeedbackErrorClass::from_kernel_error(e));
        }
    }

    Ok(FeedbackOutcome {
        rule: None,
        valid: false,
        attempts: per_rule_cap,
        errors,
        auto_fixed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsk_kernel::{bootstrap_schema, Kernel, SymbolTable};
    use nsk_transducers::ScriptedClient;

    fn kernel() -> Kernel {
        let table = SymbolTable::new();
        let schema = bootstrap_schema(&table);
        Kernel::new(table, schema)
    }

    #[test]
    fn pre_validate_flags_prolog_negation() {
        let issues = pre_validate("blocked(X) :- action(X), \\+permitted(X).");
        assert!(issues.contains(&FeedbackErrorClass::PrologNegation));
    }

    #[test]
    fn pre_validate_flags_missing_period() {
        let issues = pre_validate("blocked(X) :- action(X)");
        assert!(issues.contains(&FeedbackErrorClass::MissingPeriod));
    }

    #[test]
    fn quick_fix_swaps_prolog_negation_for_bang() {
        let (fixed, changed) = quick_fix("blocked(X) :- action(X), \\+permitted(X).", &[]);
        assert!(changed);
        assert!(fixed.contains("!permitted"));
        assert!(!fixed.contains("\\+"));
    }

    #[test]
    fn quick_fix_promotes_known_quoted_atoms() {
        let (fixed, changed) = quick_fix(
            "active_strategy(\"implement\").",
            &["implement".to_string()],
        );
        assert!(changed);
        assert_eq!(fixed, "active_strategy(/implement).");
    }

    #[test]
    fn full_sanitize_appends_missing_period() {
        assert_eq!(full_sanitize("blocked(X) :- action(X)"), "blocked(X) :- action(X).");
    }

    #[test]
    fn extract_rule_tolerates_rule_prefix_and_prose() {
        let raw = "Sure, here you go.\n\nRULE: blocked(X) :- action(X), !permitted(X).\n\nLet me know if that helps.";
        assert_eq!(
            extract_rule(raw).unwrap(),
            "blocked(X) :- action(X), !permitted(X)."
        );
    }

    #[test]
    fn extract_rule_tolerates_fenced_code_block() {
        let raw = "```prolog\nblocked(X) :- action(X), !permitted(X).\n```";
        assert_eq!(
            extract_rule(raw).unwrap(),
            "blocked(X) :- action(X), !permitted(X)."
        );
    }

    #[tokio::test]
    async fn generate_and_validate_succeeds_on_first_clean_reply() {
        let client = ScriptedClient::new(vec![
            "blocked(X) :- action(X), !permitted(X).".to_string(),
        ]);
        let kernel = kernel();
        let mut budget = SessionBudget::new(20);
        let outcome = generate_and_validate(
            &client,
            &kernel,
            "sys",
            "propose a rule blocking unpermitted actions",
            "safety",
            &[],
            3,
            &mut budget,
        )
        .await
        .unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.auto_fixed);
    }

    #[tokio::test]
    async fn generate_and_validate_auto_fixes_prolog_negation_then_succeeds() {
        let client = ScriptedClient::new(vec![
            "blocked(X) :- action(X), \\+permitted(X).".to_string(),
        ]);
        let kernel = kernel();
        let mut budget = SessionBudget::new(20);
        let outcome = generate_and_validate(
            &client, &kernel, "sys", "user", "safety", &[], 3, &mut budget,
        )
        .await
        .unwrap();
        assert!(outcome.valid);
        assert!(outcome.auto_fixed);
    }

    #[tokio::test]
    async fn generate_and_validate_rejects_core_owned_head_after_exhausting_budget() {
        let client = ScriptedClient::new(vec![
            "permitted(X) :- action(X).".to_string(),
            "permitted(X) :- action(X).".to_string(),
        ]);
        let kernel = kernel();
        let mut budget = SessionBudget::new(20);
        let outcome = generate_and_validate(
            &client, &kernel, "sys", "user", "safety", &[], 2, &mut budget,
        )
        .await
        .unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.errors.contains(&FeedbackErrorClass::UndeclaredPredicate));
    }

    #[tokio::test]
    async fn session_budget_exhaustion_propagates_as_error() {
        let client = ScriptedClient::new(vec!["permitted(X) :- action(X).".to_string()]);
        let kernel = kernel();
        let mut budget = SessionBudget::new(0);
        let err = generate_and_validate(
            &client, &kernel, "sys", "user", "safety", &[], 3, &mut budget,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AutopoiesisError::SessionBudgetExhausted { .. }));
    }
}
