//! Symbol interning for predicate and atom names.
//!
//! The predicate-dependency graph used by stratification is cyclic (mutually
//! recursive rules are legal as long as no cycle crosses a negative edge), so it
//! is modeled as a flat arena indexed by interned ids rather than as a graph of
//! owning references. Every `/atom` and predicate name in a program is interned
//! exactly once; interning is idempotent and cheap to call from the parser, the
//! schema, and the rule engine alike.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// An interned symbol. Two `Symbol`s are equal iff they name the same string.
///
/// Serializes as its raw index. This is only ever meaningful within the
/// `SymbolTable` that produced it (schema persistence re-interns by name on
/// load, per `Schema`'s own (de)serialization, rather than trusting a raw
/// index across processes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(u32);

impl Symbol {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Default)]
struct Inner {
    names: Vec<Arc<str>>,
    ids: FxHashMap<Arc<str>, Symbol>,
}

/// Global, thread-safe interner. Cloning a `SymbolTable` is cheap; all clones
/// share the same underlying arena.
#[derive(Clone, Default)]
pub struct SymbolTable {
    inner: Arc<RwLock<Inner>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, name: &str) -> Symbol {
        if let Some(sym) = self.inner.read().unwrap().ids.get(name) {
            return *sym;
        }
        let mut inner = self.inner.write().unwrap();
        if let Some(sym) = inner.ids.get(name) {
            return *sym;
        }
        let id = Symbol(inner.names.len() as u32);
        let arc: Arc<str> = Arc::from(name);
        inner.names.push(arc.clone());
        inner.ids.insert(arc, id);
        id
    }

    pub fn resolve(&self, sym: Symbol) -> Arc<str> {
        self.inner
            .read()
            .unwrap()
            .names
            .get(sym.0 as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from("<invalid-symbol>"))
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let table = SymbolTable::new();
        let a = table.intern("/active");
        let b = table.intern("/active");
        assert_eq!(a, b);
        assert_eq!(&*table.resolve(a), "/active");
    }

    #[test]
    fn distinct_names_get_distinct_symbols() {
        let table = SymbolTable::new();
        let a = table.intern("/active");
        let b = table.intern("/inactive");
        assert_ne!(a, b);
    }

    #[test]
    fn shared_arena_across_clones() {
        let table = SymbolTable::new();
        let clone = table.clone();
        let a = table.intern("permitted");
        let b = clone.intern("permitted");
        assert_eq!(a, b);
    }
}
