//! Stratification: partition intensional predicates into numbered strata
//! such that no predicate depends negatively on a predicate in the same or a
//! later stratum.
//!
//! The predicate-dependency graph is cyclic by design (transitive closure and
//! other mutually recursive rules are legal), so this is not modeled with
//! owning references: it is a flat map of `Symbol -> Vec<(Symbol, is_negative)>`
//! edges, and stratum numbers are computed by relaxation rather than by
//! walking a tree.

use crate::error::{Error, Result};
use crate::rule::Rule;
use crate::symbol::{Symbol, SymbolTable};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Clone, Debug, Default)]
pub struct Stratification {
    /// predicate -> stratum number
    pub stratum_of: FxHashMap<Symbol, usize>,
    pub num_strata: usize,
}

impl Stratification {
    pub fn stratum_of_rule(&self, rule: &Rule) -> usize {
        self.stratum_of.get(&rule.head.predicate).copied().unwrap_or(0)
    }
}

/// Compute stratification for a rule set. Predicates with no rules at all
/// (pure extensional facts) are implicitly stratum 0 and need no entry.
///
/// Algorithm: relax `stratum[head] >= stratum[body_pred] + (1 if negative else 0)`
/// to a fixpoint. A program with a genuine negative cycle never converges
/// within `num_predicates` iterations; any other acyclic-through-negation
/// program converges in at most that many rounds, mirroring the standard
/// precedence-graph construction for stratified Datalog.
pub fn compute_stratification(rules: &[Rule], table: &SymbolTable) -> Result<Stratification> {
    let mut stratum: FxHashMap<Symbol, usize> = FxHashMap::default();
    let mut predicates: FxHashSet<Symbol> = FxHashSet::default();

    for rule in rules {
        predicates.insert(rule.head.predicate);
        stratum.entry(rule.head.predicate).or_insert(0);
        for (pred, _) in rule.body_predicates() {
            predicates.insert(pred);
            stratum.entry(pred).or_insert(0);
        }
    }

    let bound = predicates.len().max(1) + 1;
    let mut converged = false;
    for _ in 0..=bound {
        let mut changed = false;
        for rule in rules {
            let head = rule.head.predicate;
            for (body_pred, is_negative) in rule.body_predicates() {
                let required = stratum[&body_pred] + usize::from(is_negative);
                if stratum[&head] < required {
                    stratum.insert(head, required);
                    changed = true;
                }
            }
        }
        if !changed {
            converged = true;
            break;
        }
    }

    if !converged {
        let offenders = negative_cycle_members(rules, table);
        return Err(Error::NotStratifiable(offenders));
    }

    let num_strata = stratum.values().copied().max().map(|m| m + 1).unwrap_or(1);
    Ok(Stratification {
        stratum_of: stratum,
        num_strata,
    })
}

/// Best-effort diagnostic: find predicates reachable from themselves through
/// at least one negative edge, for the rejection message.
fn negative_cycle_members(rules: &[Rule], table: &SymbolTable) -> Vec<String> {
    let mut edges: FxHashMap<Symbol, Vec<(Symbol, bool)>> = FxHashMap::default();
    for rule in rules {
        edges
            .entry(rule.head.predicate)
            .or_default()
            .extend(rule.body_predicates());
    }

    let mut offenders = Vec::new();
    for &start in edges.keys() {
        if reaches_self_through_negative(start, start, &edges, &mut FxHashSet::default(), false, true)
        {
            offenders.push(table.resolve(start).to_string());
        }
    }
    offenders.sort();
    offenders.dedup();
    offenders
}

fn reaches_self_through_negative(
    start: Symbol,
    current: Symbol,
    edges: &FxHashMap<Symbol, Vec<(Symbol, bool)>>,
    visited: &mut FxHashSet<Symbol>,
    seen_negative: bool,
    is_start: bool,
) -> bool {
    if !is_start && current == start && seen_negative {
        return true;
    }
    if !is_start && !visited.insert(current) {
        return false;
    }
    if let Some(deps) = edges.get(&current) {
        for &(next, is_negative) in deps {
            if reaches_self_through_negative(
                start,
                next,
                edges,
                visited,
                seen_negative || is_negative,
                false,
            ) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{AtomPattern, BodyLiteral};
    use crate::term::Term;

    fn atom(table: &SymbolTable, name: &str, args: Vec<Term>) -> AtomPattern {
        AtomPattern {
            predicate: table.intern(name),
            args,
        }
    }

    #[test]
    fn negative_cycle_is_rejected() {
        let table = SymbolTable::new();
        // losing(X) :- position(X), !winning(X).
        // winning(X) :- move(X,Y), losing(Y).
        let losing = Rule {
            head: atom(&table, "losing", vec![Term::Var("X".into())]),
            body: vec![
                BodyLiteral::Positive(atom(&table, "position", vec![Term::Var("X".into())])),
                BodyLiteral::Negative(atom(&table, "winning", vec![Term::Var("X".into())])),
            ],
            source_text: String::new(),
        };
        let winning = Rule {
            head: atom(&table, "winning", vec![Term::Var("X".into())]),
            body: vec![
                BodyLiteral::Positive(atom(
                    &table,
                    "move",
                    vec![Term::Var("X".into()), Term::Var("Y".into())],
                )),
                BodyLiteral::Positive(atom(&table, "losing", vec![Term::Var("Y".into())])),
            ],
            source_text: String::new(),
        };
        let err = compute_stratification(&[losing, winning], &table).unwrap_err();
        match err {
            Error::NotStratifiable(members) => {
                assert!(members.contains(&"losing".to_string()));
                assert!(members.contains(&"winning".to_string()));
            }
            other => panic!("expected NotStratifiable, got {other:?}"),
        }
    }

    #[test]
    fn mutual_positive_recursion_is_stratifiable() {
        let table = SymbolTable::new();
        // even(X) :- zero(X).
        // even(X) :- succ(Y, X), odd(Y).
        // odd(X) :- succ(Y, X), even(Y).
        let even1 = Rule {
            head: atom(&table, "even", vec![Term::Var("X".into())]),
            body: vec![BodyLiteral::Positive(atom(
                &table,
                "zero",
                vec![Term::Var("X".into())],
            ))],
            source_text: String::new(),
        };
        let even2 = Rule {
            head: atom(&table, "even", vec![Term::Var("X".into())]),
            body: vec![
                BodyLiteral::Positive(atom(
                    &table,
                    "succ",
                    vec![Term::Var("Y".into()), Term::Var("X".into())],
                )),
                BodyLiteral::Positive(atom(&table, "odd", vec![Term::Var("Y".into())])),
            ],
            source_text: String::new(),
        };
        let odd1 = Rule {
            head: atom(&table, "odd", vec![Term::Var("X".into())]),
            body: vec![
                BodyLiteral::Positive(atom(
                    &table,
                    "succ",
                    vec![Term::Var("Y".into()), Term::Var("X".into())],
                )),
                BodyLiteral::Positive(atom(&table, "even", vec![Term::Var("Y".into())])),
            ],
            source_text: String::new(),
        };
        let strat = compute_stratification(&[even1, even2, odd1], &table).unwrap();
        assert_eq!(strat.num_strata, 1);
    }

    #[test]
    fn negation_strictly_increases_stratum() {
        let table = SymbolTable::new();
        // permitted derived at stratum 0 from raw facts; blocked negates it.
        let permitted = Rule {
            head: atom(&table, "permitted", vec![Term::Var("X".into())]),
            body: vec![BodyLiteral::Positive(atom(
                &table,
                "action_allowed",
                vec![Term::Var("X".into())],
            ))],
            source_text: String::new(),
        };
        let blocked = Rule {
            head: atom(&table, "blocked", vec![Term::Var("X".into())]),
            body: vec![
                BodyLiteral::Positive(atom(&table, "action", vec![Term::Var("X".into())])),
                BodyLiteral::Negative(atom(&table, "permitted", vec![Term::Var("X".into())])),
            ],
            source_text: String::new(),
        };
        let strat = compute_stratification(&[permitted, blocked], &table).unwrap();
        let p = table.intern("permitted");
        let b = table.intern("blocked");
        assert!(strat.stratum_of[&b] > strat.stratum_of[&p]);
    }
}
