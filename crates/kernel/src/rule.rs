//! Rules: `Head :- Body.` where Body is a conjunction of positive atoms,
//! negated atoms, comparisons, and an optional trailing aggregation pipeline.

use crate::symbol::{Symbol, SymbolTable};
use crate::term::Term;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompOp::Eq => "=",
            CompOp::Ne => "!=",
            CompOp::Lt => "<",
            CompOp::Le => "<=",
            CompOp::Gt => ">",
            CompOp::Ge => ">=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggFn {
    Count,
    Sum,
    Min,
    Max,
    Collect,
}

impl AggFn {
    pub fn name(&self) -> &'static str {
        match self {
            AggFn::Count => "count",
            AggFn::Sum => "sum",
            AggFn::Min => "min",
            AggFn::Max => "max",
            AggFn::Collect => "collect",
        }
    }
}

/// `|> do fn:group_by(V...), let X = fn:<agg>(arg).`
#[derive(Clone, Debug)]
pub struct AggPipeline {
    pub group_by: Vec<String>,
    pub result_var: String,
    pub agg_fn: AggFn,
    pub agg_arg: String,
}

#[derive(Clone, Debug)]
pub struct AtomPattern {
    pub predicate: Symbol,
    pub args: Vec<Term>,
}

impl AtomPattern {
    pub fn vars(&self) -> Vec<String> {
        let mut out = Vec::new();
        for arg in &self.args {
            arg.collect_vars(&mut out);
        }
        out
    }
}

#[derive(Clone, Debug)]
pub enum BodyLiteral {
    Positive(AtomPattern),
    Negative(AtomPattern),
    Comparison(Term, CompOp, Term),
    Aggregate(AggPipeline),
}

#[derive(Clone, Debug)]
pub struct Rule {
    pub head: AtomPattern,
    pub body: Vec<BodyLiteral>,
    /// Monotonically increasing id, assigned at load time; used to detect
    /// "same hash seen at two history steps" stagnation in autopoiesis.
    pub source_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyViolation {
    /// A head variable does not appear in any positive body atom.
    UnsafeHead(String),
    /// A variable under negation or comparison is never bound by an earlier
    /// positive atom.
    UnboundNegated(String),
}

impl Rule {
    pub fn body_predicates(&self) -> Vec<(Symbol, bool)> {
        self.body
            .iter()
            .filter_map(|lit| match lit {
                BodyLiteral::Positive(a) => Some((a.predicate, false)),
                BodyLiteral::Negative(a) => Some((a.predicate, true)),
                _ => None,
            })
            .collect()
    }

    /// Range restriction + safety, per the data model invariants: every head
    /// variable must appear in a positive body atom, and every variable under
    /// negation/comparison must be bound by an earlier positive atom.
    pub fn check_safety(&self) -> Result<(), SafetyViolation> {
        let mut bound: Vec<String> = Vec::new();
        for lit in &self.body {
            match lit {
                BodyLiteral::Positive(atom) => {
                    for v in atom.vars() {
                        if !bound.contains(&v) {
                            bound.push(v);
                        }
                    }
                }
                BodyLiteral::Negative(atom) => {
                    for v in atom.vars() {
                        if !bound.contains(&v) {
                            return Err(SafetyViolation::UnboundNegated(v));
                        }
                    }
                }
                BodyLiteral::Comparison(lhs, _, rhs) => {
                    for t in [lhs, rhs] {
                        if let Some(v) = t.as_var() {
                            if !bound.contains(&v.to_string()) {
                                return Err(SafetyViolation::UnboundNegated(v.to_string()));
                            }
                        }
                    }
                }
                BodyLiteral::Aggregate(pipeline) => {
                    for v in &pipeline.group_by {
                        if !bound.contains(v) {
                            return Err(SafetyViolation::UnboundNegated(v.clone()));
                        }
                    }
                    bound.push(pipeline.result_var.clone());
                }
            }
        }
        for v in self.head.vars() {
            if !bound.contains(&v) {
                return Err(SafetyViolation::UnsafeHead(v));
            }
        }
        Ok(())
    }

    pub fn render(&self, table: &SymbolTable) -> String {
        let head = render_atom(&self.head, table);
        if self.body.is_empty() {
            return format!("{head}.");
        }
        let body: Vec<_> = self
            .body
            .iter()
            .map(|lit| render_literal(lit, table))
            .collect();
        format!("{head} :- {}.", body.join(", "))
    }
}

fn render_atom(atom: &AtomPattern, table: &SymbolTable) -> String {
    let args: Vec<_> = atom.args.iter().map(|t| t.render(table)).collect();
    format!("{}({})", table.resolve(atom.predicate), args.join(", "))
}

fn render_literal(lit: &BodyLiteral, table: &SymbolTable) -> String {
    match lit {
        BodyLiteral::Positive(a) => render_atom(a, table),
        BodyLiteral::Negative(a) => format!("!{}", render_atom(a, table)),
        BodyLiteral::Comparison(l, op, r) => {
            format!("{} {} {}", l.render(table), op.symbol(), r.render(table))
        }
        BodyLiteral::Aggregate(p) => format!(
            "do fn:group_by({}), let {} = fn:{}({})",
            p.group_by.join(", "),
            p.result_var,
            p.agg_fn.name(),
            p.agg_arg
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    fn atom(table: &SymbolTable, name: &str, args: Vec<Term>) -> AtomPattern {
        AtomPattern {
            predicate: table.intern(name),
            args,
        }
    }

    #[test]
    fn unsafe_head_variable_is_rejected() {
        let table = SymbolTable::new();
        let rule = Rule {
            head: atom(&table, "blocked", vec![Term::Var("X".into())]),
            body: vec![],
            source_text: String::new(),
        };
        assert_eq!(
            rule.check_safety(),
            Err(SafetyViolation::UnsafeHead("X".into()))
        );
    }

    #[test]
    fn unbound_negated_variable_is_rejected() {
        let table = SymbolTable::new();
        let rule = Rule {
            head: atom(&table, "blocked", vec![Term::Var("X".into())]),
            body: vec![BodyLiteral::Negative(atom(
                &table,
                "permitted",
                vec![Term::Var("X".into())],
            ))],
            source_text: String::new(),
        };
        assert_eq!(
            rule.check_safety(),
            Err(SafetyViolation::UnboundNegated("X".into()))
        );
    }

    #[test]
    fn properly_bound_rule_is_safe() {
        let table = SymbolTable::new();
        let rule = Rule {
            head: atom(&table, "blocked", vec![Term::Var("X".into())]),
            body: vec![
                BodyLiteral::Positive(atom(&table, "action", vec![Term::Var("X".into())])),
                BodyLiteral::Negative(atom(&table, "permitted", vec![Term::Var("X".into())])),
            ],
            source_text: String::new(),
        };
        assert!(rule.check_safety().is_ok());
    }
}
