//! Schema: the declared shape and ownership of every predicate in the
//! program. Every assert is checked against this before it can mutate the
//! fact store; every candidate rule's head predicate is checked against the
//! core-owned set before it can be learned.

use crate::symbol::{Symbol, SymbolTable};
use crate::term::TermType;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Whether a predicate's extension is supplied directly (extensional) or
/// computed by rules (intensional).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Extensional,
    Intensional,
}

/// Who may author facts/rules for a predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    System,
    User,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PredicateDecl {
    pub predicate: Symbol,
    pub arity: usize,
    pub arg_types: Vec<TermType>,
    pub owner: Owner,
    pub visibility: Visibility,
    pub docstring: String,
    /// If true, autopoiesis may never author a rule whose head is this
    /// predicate (e.g. `permitted`, `system_shard_state`).
    pub core_owned: bool,
    /// Per-argument closed-enum constraint: `Some(allowed)` at index `i`
    /// means an atom argument at that position must be one of `allowed`.
    /// `None` (the default, via `arg_enum_defaults`) means any atom is
    /// accepted. Resolves §9's open question about multiple spellings for
    /// the same category atom (`/boot` vs `/initializing` vs `/cold_start`)
    /// by making the canonical set schema-enforced rather than a convention.
    #[serde(default)]
    pub arg_enums: Vec<Option<Vec<Symbol>>>,
}

#[derive(Clone, Default)]
pub struct Schema {
    decls: FxHashMap<Symbol, PredicateDecl>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, decl: PredicateDecl) {
        self.decls.insert(decl.predicate, decl);
    }

    pub fn get(&self, predicate: Symbol) -> Option<&PredicateDecl> {
        self.decls.get(&predicate)
    }

    pub fn is_declared(&self, predicate: Symbol) -> bool {
        self.decls.contains_key(&predicate)
    }

    pub fn is_core_owned(&self, predicate: Symbol) -> bool {
        self.decls
            .get(&predicate)
            .map(|d| d.core_owned)
            .unwrap_or(false)
    }

    pub fn visibility(&self, predicate: Symbol) -> Option<Visibility> {
        self.decls.get(&predicate).map(|d| d.visibility)
    }

    pub fn all(&self) -> impl Iterator<Item = &PredicateDecl> {
        self.decls.values()
    }

    pub fn render(&self, table: &SymbolTable) -> Vec<String> {
        let mut lines: Vec<String> = self
            .decls
            .values()
            .map(|d| {
                let types: Vec<_> = d.arg_types.iter().map(TermType::name).collect();
                let owner = match d.owner {
                    Owner::System => "system",
                    Owner::User => "user",
                };
                let vis = match d.visibility {
                    Visibility::Extensional => "extensional",
                    Visibility::Intensional => "intensional",
                };
                format!(
                    "Decl {}({}). # owner={} visibility={} core_owned={} -- {}",
                    table.resolve(d.predicate),
                    types.join(", "),
                    owner,
                    vis,
                    d.core_owned,
                    d.docstring
                )
            })
            .collect();
        lines.sort();
        lines
    }
}

/// Canonical declarations that every kernel boots with: the core-owned
/// control-plane predicates the Dreamer, dispatcher, and scheduler depend on,
/// plus the canonical lifecycle-category atom that resolves the spelling
/// ambiguity noted in the source (`/boot`, never `/initializing` or
/// `/cold_start`).
pub fn bootstrap_schema(table: &SymbolTable) -> Schema {
    let mut schema = Schema::new();
    let mut decl = |schema: &mut Schema,
                    name: &str,
                    types: Vec<TermType>,
                    owner: Owner,
                    vis: Visibility,
                    core_owned: bool,
                    doc: &str| {
        let arg_enums = vec![None; types.len()];
        schema.declare(PredicateDecl {
            predicate: table.intern(name),
            arity: types.len(),
            arg_types: types,
            owner,
            visibility: vis,
            docstring: doc.to_string(),
            core_owned,
            arg_enums,
        });
    };

    // `permitted`/`block_*`/`system_shard_state` are core-owned (no learned
    // rule may have one in its head, enforced by `core_owned` below
    // independent of visibility) but are populated as ordinary stratum-0
    // facts by policy ingestion, the dispatcher, and the shard scheduler —
    // not derived by rules — so they are declared Extensional.
    decl(
        &mut schema,
        "permitted",
        vec![TermType::Atom],
        Owner::System,
        Visibility::Extensional,
        true,
        "true if the named action kind may be dispatched right now",
    );
    decl(
        &mut schema,
        "block_commit",
        vec![TermType::Str],
        Owner::System,
        Visibility::Extensional,
        true,
        "reason a commit is currently blocked",
    );
    decl(
        &mut schema,
        "block_refactor",
        vec![TermType::Str],
        Owner::System,
        Visibility::Extensional,
        true,
        "reason a refactor is currently blocked",
    );
    decl(
        &mut schema,
        "system_shard_state",
        vec![TermType::Str, TermType::Atom],
        Owner::System,
        Visibility::Extensional,
        true,
        "lifecycle state of a system shard",
    );
    // Not core-owned: unlike `permitted`/`block_*`, `panic_state` is purely
    // monotonic (no rule anywhere negates it), so a learned rule can only
    // ever add another way to detect danger, never suppress one the
    // dreamer's own bootstrap rules already derive. That is also what lets
    // the dreamer's bootstrap `panic_state` rules themselves be loaded
    // through the same `hot_load_rule` a learned rule would use.
    decl(
        &mut schema,
        "panic_state",
        vec![TermType::Str],
        Owner::System,
        Visibility::Intensional,
        false,
        "derived when a Dreamer simulation finds an unsafe projected effect",
    );
    decl(
        &mut schema,
        "boot_phase",
        vec![TermType::Atom],
        Owner::System,
        Visibility::Extensional,
        true,
        "canonical lifecycle category atom; always /boot, never /initializing or /cold_start",
    );
    // The closed-enum constraint itself: only `/boot` may ever fill this
    // argument. `decl` above declares the shape; this line is what actually
    // enforces the single canonical spelling at assert time.
    if let Some(d) = schema.decls.get_mut(&table.intern("boot_phase")) {
        d.arg_enums = vec![Some(vec![table.intern("boot")])];
    }
    decl(
        &mut schema,
        "clarification_needed",
        vec![TermType::Str],
        Owner::System,
        Visibility::Intensional,
        false,
        "derived when no focus_resolution reaches the confidence threshold",
    );
    decl(
        &mut schema,
        "focus_resolution",
        vec![TermType::Str, TermType::Str, TermType::Atom, TermType::Float],
        Owner::System,
        Visibility::Extensional,
        false,
        "(raw, resolved, symbol, confidence) asserted by Perception from vector-similarity candidates",
    );
    decl(
        &mut schema,
        "semantic_match",
        vec![
            TermType::Str,
            TermType::Str,
            TermType::Atom,
            TermType::Int,
            TermType::Float,
        ],
        Owner::System,
        Visibility::Extensional,
        false,
        "(input, canonical, symbol, rank, similarity) asserted by Perception's vector-similarity service",
    );
    decl(
        &mut schema,
        "focus_resolved",
        vec![TermType::Str],
        Owner::System,
        Visibility::Intensional,
        false,
        "derived when some focus_resolution for this raw reference clears the confidence threshold",
    );
    schema
}

/// The rule text loaded into every booted kernel (`AgentState::boot`) so
/// §4.2's confidence gate is an ordinary derivation rather than special-cased
/// Rust code: Perception only ever asserts `focus_resolution` facts, these
/// two rules decide whether that clears the bar.
pub fn bootstrap_rules() -> &'static [&'static str] {
    &[
        // Unification treats every occurrence of the same variable name as
        // the same binding (no anonymous `_`), so each position gets its own
        // name even where the value is unused.
        "focus_resolved(Raw) :- focus_resolution(Raw, Resolved, Sym, C), C >= 0.85.",
        "clarification_needed(Raw) :- focus_resolution(Raw, Resolved, Sym, C), C < 0.85, !focus_resolved(Raw).",
    ]
}
