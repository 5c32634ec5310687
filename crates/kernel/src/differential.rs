//! Differential (semi-naive) bottom-up evaluation.
//!
//! For each stratum, a delta set of newly derived facts is maintained; only
//! rules whose body mentions a delta predicate are re-applied each round, and
//! only new derivations are added to the next delta. This is what makes
//! re-evaluation proportional to what changed rather than to the whole fact
//! store, which matters because the fact store grows monotonically within a
//! turn and recomputing from scratch every time is prohibitive.

use crate::error::{Error, Result};
use crate::fact::Fact;
use crate::rule::{AggFn, AggPipeline, AtomPattern, BodyLiteral, CompOp, Rule};
use crate::symbol::Symbol;
use crate::term::Term;
use rustc_hash::{FxHashMap, FxHashSet};

pub type Bindings = FxHashMap<String, Term>;
pub type Relation = FxHashSet<Fact>;
pub type Relations = FxHashMap<Symbol, Relation>;

fn substitute(term: &Term, bindings: &Bindings) -> Term {
    match term {
        Term::Var(v) => bindings.get(v).cloned().unwrap_or_else(|| term.clone()),
        Term::List(items) => Term::List(items.iter().map(|t| substitute(t, bindings)).collect()),
        Term::Struct(fields) => Term::Struct(
            fields
                .iter()
                .map(|(k, v)| (*k, substitute(v, bindings)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Attempt to unify an atom pattern against a ground fact, extending
/// `bindings`. Returns `None` on mismatch; never mutates `bindings` on
/// failure thanks to cloning at the call site.
fn unify_atom(pattern: &AtomPattern, fact: &Fact, bindings: &Bindings) -> Option<Bindings> {
    if pattern.predicate != fact.predicate || pattern.args.len() != fact.args.len() {
        return None;
    }
    let mut out = bindings.clone();
    for (p, f) in pattern.args.iter().zip(fact.args.iter()) {
        if !unify_term(p, f, &mut out) {
            return None;
        }
    }
    Some(out)
}

fn unify_term(pattern: &Term, value: &Term, bindings: &mut Bindings) -> bool {
    match pattern {
        Term::Var(v) => match bindings.get(v) {
            Some(bound) => bound == value,
            None => {
                bindings.insert(v.clone(), value.clone());
                true
            }
        },
        Term::List(pitems) => match value {
            Term::List(vitems) if pitems.len() == vitems.len() => pitems
                .iter()
                .zip(vitems.iter())
                .all(|(p, v)| unify_term(p, v, bindings)),
            _ => false,
        },
        Term::Struct(pfields) => match value {
            Term::Struct(vfields) if pfields.len() == vfields.len() => {
                pfields.iter().zip(vfields.iter()).all(|((pk, pv), (vk, vv))| {
                    pk == vk && unify_term(pv, vv, bindings)
                })
            }
            _ => false,
        },
        concrete => concrete == value,
    }
}

fn eval_comparison(lhs: &Term, op: &CompOp, rhs: &Term, bindings: &Bindings) -> bool {
    let l = substitute(lhs, bindings);
    let r = substitute(rhs, bindings);
    match op {
        CompOp::Eq => l == r,
        CompOp::Ne => l != r,
        CompOp::Lt => matches!(l.partial_cmp(&r), Some(std::cmp::Ordering::Less)),
        CompOp::Le => matches!(
            l.partial_cmp(&r),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ),
        CompOp::Gt => matches!(l.partial_cmp(&r), Some(std::cmp::Ordering::Greater)),
        CompOp::Ge => matches!(
            l.partial_cmp(&r),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ),
    }
}

/// Which relation a positive literal should be joined against this round.
enum Source<'a> {
    Full(&'a Relations),
    /// Use `delta` for literals whose predicate is in `delta`; fall back to
    /// `full` for everything else (earlier-stratum predicates are static
    /// within this stratum's fixpoint loop).
    SemiNaive {
        full: &'a Relations,
        delta: &'a Relations,
        pivot: usize,
    },
}

impl<'a> Source<'a> {
    fn relation_for(&self, literal_index: usize, predicate: Symbol) -> Option<&'a Relation> {
        match self {
            Source::Full(full) => full.get(&predicate),
            Source::SemiNaive { full, delta, pivot } => {
                if literal_index == *pivot {
                    delta.get(&predicate)
                } else {
                    full.get(&predicate)
                }
            }
        }
    }
}

fn join_positive(
    positives: &[(usize, &AtomPattern)],
    others: &[(usize, &BodyLiteral)],
    source: &Source,
    idx: usize,
    bindings: Bindings,
    out: &mut Vec<Bindings>,
) {
    if idx == positives.len() {
        if others.iter().all(|(_, lit)| match lit {
            BodyLiteral::Negative(pattern) => !negative_holds(pattern, source, &bindings),
            BodyLiteral::Comparison(l, op, r) => eval_comparison(l, op, r, &bindings),
            _ => true,
        }) {
            out.push(bindings);
        }
        return;
    }
    let (literal_index, pattern) = positives[idx];
    let Some(relation) = source.relation_for(literal_index, pattern.predicate) else {
        return;
    };
    for fact in relation {
        if let Some(extended) = unify_atom(pattern, fact, &bindings) {
            join_positive(positives, others, source, idx + 1, extended, out);
        }
    }
}

fn negative_holds(pattern: &AtomPattern, source: &Source, bindings: &Bindings) -> bool {
    let full = match source {
        Source::Full(full) => *full,
        Source::SemiNaive { full, .. } => *full,
    };
    let Some(relation) = full.get(&pattern.predicate) else {
        return false;
    };
    relation
        .iter()
        .any(|fact| unify_atom(pattern, fact, bindings).is_some())
}

fn split_body(body: &[BodyLiteral]) -> (Vec<(usize, &AtomPattern)>, Vec<(usize, &BodyLiteral)>, Option<&AggPipeline>) {
    let mut positives = Vec::new();
    let mut others = Vec::new();
    let mut agg = None;
    for (i, lit) in body.iter().enumerate() {
        match lit {
            BodyLiteral::Positive(p) => positives.push((i, p)),
            BodyLiteral::Aggregate(pipeline) => agg = Some(pipeline),
            _ => others.push((i, lit)),
        }
    }
    (positives, others, agg)
}

fn apply_aggregate(pipeline: &AggPipeline, rows: Vec<Bindings>) -> Result<Vec<Bindings>> {
    let mut groups: FxHashMap<Vec<Term>, Vec<Bindings>> = FxHashMap::default();
    for row in rows {
        let key: Vec<Term> = pipeline
            .group_by
            .iter()
            .map(|v| row.get(v).cloned().unwrap_or(Term::Bool(false)))
            .collect();
        groups.entry(key).or_default().push(row);
    }

    let mut out = Vec::new();
    for (_key, members) in groups {
        let values: Vec<Term> = members
            .iter()
            .filter_map(|b| b.get(&pipeline.agg_arg).cloned())
            .collect();
        let result = match pipeline.agg_fn {
            AggFn::Count => Term::Int(values.len() as i64),
            AggFn::Collect => Term::List(values),
            AggFn::Sum => Term::Float(numeric_values(&values).iter().sum()),
            AggFn::Min => numeric_values(&values)
                .into_iter()
                .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
                .map(Term::Float)
                .ok_or_else(|| Error::Aggregation("min over empty group".into()))?,
            AggFn::Max => numeric_values(&values)
                .into_iter()
                .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
                .map(Term::Float)
                .ok_or_else(|| Error::Aggregation("max over empty group".into()))?,
        };
        let mut bindings = members
            .first()
            .cloned()
            .unwrap_or_else(FxHashMap::default);
        bindings.insert(pipeline.result_var.clone(), result);
        out.push(bindings);
    }
    Ok(out)
}

fn numeric_values(values: &[Term]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|t| match t {
            Term::Int(i) => Some(*i as f64),
            Term::Float(f) => Some(*f),
            _ => None,
        })
        .collect()
}

fn head_fact(rule: &Rule, bindings: &Bindings) -> Fact {
    let args: Vec<Term> = rule
        .head
        .args
        .iter()
        .map(|t| substitute(t, bindings))
        .collect();
    Fact::new(rule.head.predicate, args)
}

/// Evaluate one rule against an arbitrary positive-literal source, returning
/// newly derivable (not-yet-deduplicated) facts.
pub fn evaluate_rule(rule: &Rule, full: &Relations) -> Result<Vec<Fact>> {
    evaluate_rule_with_source(rule, &Source::Full(full))
}

/// Semi-naive variant: literal at `pivot` is drawn from `delta`, all other
/// positive literals from `full`.
pub fn evaluate_rule_delta(
    rule: &Rule,
    full: &Relations,
    delta: &Relations,
    pivot: usize,
) -> Result<Vec<Fact>> {
    evaluate_rule_with_source(
        rule,
        &Source::SemiNaive {
            full,
            delta,
            pivot,
        },
    )
}

fn evaluate_rule_with_source(rule: &Rule, source: &Source) -> Result<Vec<Fact>> {
    let (positives, others, agg) = split_body(&rule.body);
    let mut rows = Vec::new();
    join_positive(&positives, &others, source, 0, Bindings::default(), &mut rows);
    let rows = match agg {
        Some(pipeline) => apply_aggregate(pipeline, rows)?,
        None => rows,
    };
    Ok(rows.iter().map(|b| head_fact(rule, b)).collect())
}

/// Bring a single stratum's rules to fixpoint against the accumulated
/// `base` relations (from lower strata, already final) and return the full
/// set of newly derived facts for predicates defined in this stratum.
pub fn evaluate_stratum(rules: &[Rule], base: &Relations) -> Result<Relations> {
    let mut all: Relations = base.clone();
    let mut delta: Relations = Relations::default();

    // Seed: naive full evaluation once to get the initial delta.
    for rule in rules {
        let derived = evaluate_rule(rule, &all)?;
        let relation = all.entry(rule.head.predicate).or_default();
        let bucket = delta.entry(rule.head.predicate).or_default();
        for fact in derived {
            if relation.insert(fact.clone()) {
                bucket.insert(fact);
            }
        }
    }

    loop {
        if delta.values().all(|r| r.is_empty()) {
            break;
        }
        let mut next_delta: Relations = Relations::default();
        for rule in rules {
            for (literal_index, lit) in rule.body.iter().enumerate() {
                let BodyLiteral::Positive(pattern) = lit else {
                    continue;
                };
                if delta
                    .get(&pattern.predicate)
                    .map(|d| d.is_empty())
                    .unwrap_or(true)
                {
                    continue;
                }
                let derived = evaluate_rule_delta(rule, &all, &delta, literal_index)?;
                let relation = all.entry(rule.head.predicate).or_default();
                let bucket = next_delta.entry(rule.head.predicate).or_default();
                for fact in derived {
                    if relation.insert(fact.clone()) {
                        bucket.insert(fact);
                    }
                }
            }
        }
        delta = next_delta;
    }

    let mut derived_only = Relations::default();
    for rule in rules {
        derived_only
            .entry(rule.head.predicate)
            .or_insert_with(|| all.get(&rule.head.predicate).cloned().unwrap_or_default());
    }
    Ok(derived_only)
}
