//! Terms: the values that flow through facts and rules.
//!
//! A term is one of: an interned atom, a string, an integer, a float, a
//! boolean, a list of terms, a struct (ordered `/key: value` pairs), or —
//! only inside rule bodies, never in a ground fact — a variable.
//!
//! Atoms and strings are deliberately separate variants with no `From`/`Into`
//! conversion between them and no shared comparison path: `/active` and
//! `"active"` must never compare equal, and the type system is the one thing
//! enforcing that rather than call-site discipline.

use crate::symbol::{Symbol, SymbolTable};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Clone, Debug)]
pub enum Term {
    Atom(Symbol),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Term>),
    Struct(Vec<(Symbol, Term)>),
    /// Only legal inside rule bodies/heads; a ground fact never contains one.
    Var(String),
}

impl Term {
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Var(_) => false,
            Term::List(items) => items.iter().all(Term::is_ground),
            Term::Struct(fields) => fields.iter().all(|(_, v)| v.is_ground()),
            _ => true,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Term::Atom(_) => "atom",
            Term::Str(_) => "string",
            Term::Int(_) => "int",
            Term::Float(_) => "float",
            Term::Bool(_) => "bool",
            Term::List(_) => "list",
            Term::Struct(_) => "struct",
            Term::Var(_) => "var",
        }
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Collect every distinct variable name appearing in this term.
    pub fn collect_vars(&self, into: &mut Vec<String>) {
        match self {
            Term::Var(v) => {
                if !into.iter().any(|x| x == v) {
                    into.push(v.clone());
                }
            }
            Term::List(items) => items.iter().for_each(|t| t.collect_vars(into)),
            Term::Struct(fields) => fields.iter().for_each(|(_, v)| v.collect_vars(into)),
            _ => {}
        }
    }

    pub fn render(&self, table: &SymbolTable) -> String {
        match self {
            Term::Atom(s) => format!("/{}", table.resolve(*s)),
            Term::Str(s) => serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}")),
            Term::Int(i) => i.to_string(),
            Term::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Term::Bool(b) => b.to_string(),
            Term::List(items) => {
                let rendered: Vec<_> = items.iter().map(|t| t.render(table)).collect();
                format!("[{}]", rendered.join(", "))
            }
            Term::Struct(fields) => {
                let rendered: Vec<_> = fields
                    .iter()
                    .map(|(k, v)| format!("/{}: {}", table.resolve(*k), v.render(table)))
                    .collect();
                format!("{{{}}}", rendered.join(", "))
            }
            Term::Var(v) => v.clone(),
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Term::Atom(a), Term::Atom(b)) => a == b,
            (Term::Str(a), Term::Str(b)) => a == b,
            (Term::Int(a), Term::Int(b)) => a == b,
            (Term::Float(a), Term::Float(b)) => a.to_bits() == b.to_bits(),
            (Term::Bool(a), Term::Bool(b)) => a == b,
            (Term::List(a), Term::List(b)) => a == b,
            (Term::Struct(a), Term::Struct(b)) => a == b,
            (Term::Var(a), Term::Var(b)) => a == b,
            // Deliberately no cross-variant arm: an atom and a string with the
            // same spelling are unrelated values.
            _ => false,
        }
    }
}

impl Eq for Term {}

impl std::hash::Hash for Term {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Term::Atom(s) => s.hash(state),
            Term::Str(s) => s.hash(state),
            Term::Int(i) => i.hash(state),
            Term::Float(f) => f.to_bits().hash(state),
            Term::Bool(b) => b.hash(state),
            Term::List(items) => items.hash(state),
            Term::Struct(fields) => fields.hash(state),
            Term::Var(v) => v.hash(state),
        }
    }
}

/// Partial order used only by `<`/`<=`/`>`/`>=` comparison literals in rule
/// bodies. Comparing across types (e.g. an int to an atom) is always `None`.
impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Term::Int(a), Term::Int(b)) => a.partial_cmp(b),
            (Term::Float(a), Term::Float(b)) => a.partial_cmp(b),
            (Term::Int(a), Term::Float(b)) => (*a as f64).partial_cmp(b),
            (Term::Float(a), Term::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Term::Str(a), Term::Str(b)) => a.partial_cmp(b),
            (Term::Bool(a), Term::Bool(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Declared argument type for schema validation. `Any` accepts every term,
/// including `Var` in rule positions (schema checks only run against ground
/// facts asserted at stratum 0).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermType {
    Atom,
    Str,
    Int,
    Float,
    Bool,
    List(Box<TermType>),
    Struct,
    Any,
}

impl TermType {
    pub fn accepts(&self, term: &Term) -> bool {
        match (self, term) {
            (TermType::Any, _) => true,
            (TermType::Atom, Term::Atom(_)) => true,
            (TermType::Str, Term::Str(_)) => true,
            (TermType::Int, Term::Int(_)) => true,
            (TermType::Float, Term::Float(_)) => true,
            // An int literal is accepted where a float is declared: widening,
            // never narrowing.
            (TermType::Float, Term::Int(_)) => true,
            (TermType::Bool, Term::Bool(_)) => true,
            (TermType::Struct, Term::Struct(_)) => true,
            (TermType::List(inner), Term::List(items)) => items.iter().all(|t| inner.accepts(t)),
            _ => false,
        }
    }

    pub fn name(&self) -> String {
        match self {
            TermType::Atom => "atom".to_string(),
            TermType::Str => "string".to_string(),
            TermType::Int => "int".to_string(),
            TermType::Float => "float".to_string(),
            TermType::Bool => "bool".to_string(),
            TermType::List(inner) => format!("[{}]", inner.name()),
            TermType::Struct => "struct".to_string(),
            TermType::Any => "any".to_string(),
        }
    }
}
