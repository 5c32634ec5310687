//! The Kernel façade: the single entry point the rest of the system uses to
//! assert/retract/query facts, bring the program to fixpoint, and hot-load or
//! sandbox-validate new rules.

use crate::differential::{evaluate_stratum, Relations};
use crate::error::{Error, Result};
use crate::fact::Fact;
use crate::parser::{self, Statement};
use crate::rule::Rule;
use crate::schema::{PredicateDecl, Schema};
use crate::store::{FactStore, Snapshot};
use crate::stratify::{self, Stratification};
use crate::symbol::{Symbol, SymbolTable};
use tracing::{debug, info, warn};

/// Structured diagnostics returned by `sandbox_validate`, one entry per
/// rejection reason, classified so the Feedback Loop can build its next,
/// stricter prompt from them without re-deriving the failure class itself.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<Error>,
}

impl ValidationReport {
    fn ok() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    fn err(e: Error) -> Self {
        Self {
            ok: false,
            errors: vec![e],
        }
    }
}

#[derive(Clone)]
pub struct Kernel {
    pub symbols: SymbolTable,
    schema: Schema,
    store: FactStore,
    rules: Vec<Rule>,
    stratification: Stratification,
    rules_dirty: bool,
}

impl Kernel {
    pub fn new(symbols: SymbolTable, schema: Schema) -> Self {
        Self {
            symbols,
            schema,
            store: FactStore::new(),
            rules: Vec::new(),
            stratification: Stratification::default(),
            rules_dirty: false,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn declare(&mut self, decl: PredicateDecl) {
        self.schema.declare(decl);
    }

    pub fn get_declared_predicates(&self) -> Vec<&PredicateDecl> {
        self.schema.all().collect()
    }

    pub fn assert(&mut self, fact: Fact) -> Result<()> {
        self.store.assert(&self.schema, fact)
    }

    pub fn assert_batch(&mut self, facts: Vec<Fact>) -> Result<()> {
        for fact in facts {
            self.assert(fact)?;
        }
        Ok(())
    }

    pub fn retract(&mut self, predicate: Symbol) {
        self.store.retract_predicate(predicate);
    }

    pub fn retract_fact(&mut self, fact: &Fact) {
        self.store.retract_fact(fact);
    }

    pub fn query(&self, predicate: Symbol) -> Vec<Fact> {
        self.store.query(predicate)
    }

    /// Bring all strata to fixpoint. Idempotent: calling it twice in a row
    /// with no intervening assert/retract/hot_load_rule is a no-op.
    pub fn evaluate(&mut self) -> Result<()> {
        if !self.store.is_dirty() && !self.rules_dirty {
            return Ok(());
        }
        let idb = self.recompute()?;
        self.store.set_idb(idb);
        self.rules_dirty = false;
        debug!(strata = self.stratification.num_strata, "kernel evaluated to fixpoint");
        Ok(())
    }

    fn recompute(&self) -> Result<Relations> {
        let mut base: Relations = self.store.edb().clone();
        let mut idb: Relations = Relations::default();
        for stratum in 0..self.stratification.num_strata.max(1) {
            let rules_in_stratum: Vec<Rule> = self
                .rules
                .iter()
                .filter(|r| self.stratification.stratum_of_rule(r) == stratum)
                .cloned()
                .collect();
            if rules_in_stratum.is_empty() {
                continue;
            }
            let derived = evaluate_stratum(&rules_in_stratum, &base)?;
            for (pred, rel) in &derived {
                base.entry(*pred).or_default().extend(rel.iter().cloned());
                idb.entry(*pred).or_default().extend(rel.iter().cloned());
            }
        }
        Ok(idb)
    }

    /// Parse, type-check, stratify, and append a rule to the live program in
    /// a single transaction. On failure the live program is unchanged.
    pub fn hot_load_rule(&mut self, rule_text: &str) -> Result<()> {
        let rule = parser::parse_single_rule(rule_text, &self.symbols)?;
        self.validate_and_commit(rule)
    }

    fn validate_and_commit(&mut self, rule: Rule) -> Result<()> {
        rule.check_safety().map_err(|v| match v {
            crate::rule::SafetyViolation::UnsafeHead(v) => Error::UnsafeHeadVariable(v),
            crate::rule::SafetyViolation::UnboundNegated(v) => Error::UnboundNegatedVariable(v),
        })?;
        if self.schema.is_core_owned(rule.head.predicate) {
            return Err(Error::CoreOwnedViolation(
                self.symbols.resolve(rule.head.predicate).to_string(),
            ));
        }
        let mut candidate_rules = self.rules.clone();
        candidate_rules.push(rule.clone());
        let stratification = stratify::compute_stratification(&candidate_rules, &self.symbols)?;

        self.rules = candidate_rules;
        self.stratification = stratification;
        self.rules_dirty = true;
        info!(
            predicate = %self.symbols.resolve(rule.head.predicate),
            "rule committed to live program"
        );
        Ok(())
    }

    /// Same checks as `hot_load_rule` but against a throwaway clone; never
    /// mutates live state.
    pub fn sandbox_validate(&self, rule_text: &str) -> ValidationReport {
        let mut clone = self.clone();
        match clone.hot_load_rule(rule_text) {
            Ok(()) => ValidationReport::ok(),
            Err(e) => {
                warn!(error = %e, "sandbox validation rejected candidate rule");
                ValidationReport::err(e)
            }
        }
    }

    /// Load a whole program text (declarations + rules + facts) at boot.
    pub fn load_program(&mut self, src: &str) -> Result<()> {
        let statements = parser::parse_program(src, &self.symbols)?;
        for statement in statements {
            match statement {
                Statement::Decl(decl) => self.schema.declare(decl),
                Statement::Fact(fact) => self.assert(fact)?,
                Statement::Rule(rule) => self.validate_and_commit(rule)?,
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.store.restore(snapshot);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn render_program(&self) -> Vec<String> {
        let mut lines = self.schema.render(&self.symbols);
        lines.extend(self.rules.iter().map(|r| r.render(&self.symbols)));
        lines
    }
}
