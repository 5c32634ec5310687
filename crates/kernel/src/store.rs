//! The stratum store: extensional facts (stratum 0, mutable) plus a cache of
//! derived facts from the last `evaluate()` (higher strata, read-only until
//! invalidated).

use crate::differential::Relations;
use crate::error::{Error, Result};
use crate::fact::Fact;
use crate::schema::{Schema, Visibility};
use crate::symbol::Symbol;

#[derive(Clone, Default)]
pub struct FactStore {
    edb: Relations,
    idb: Relations,
    dirty: bool,
}

/// A copy-on-write snapshot of the whole fact store, used by `Kernel::snapshot`
/// and by the Dreamer to project hypothetical effects without touching live
/// state.
#[derive(Clone)]
pub struct Snapshot {
    pub(crate) edb: Relations,
    pub(crate) idb: Relations,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assert(&mut self, schema: &Schema, fact: Fact) -> Result<()> {
        self.validate(schema, &fact)?;
        let inserted = self.edb.entry(fact.predicate).or_default().insert(fact);
        if inserted {
            self.dirty = true;
        }
        Ok(())
    }

    fn validate(&self, schema: &Schema, fact: &Fact) -> Result<()> {
        let Some(decl) = schema.get(fact.predicate) else {
            // Undeclared predicates are permitted as EDB facts for rapid
            // prototyping of new perception atoms, matching the teacher's
            // permissive `serde(default)` posture elsewhere; declared
            // predicates, however, are fully checked.
            return Ok(());
        };
        if decl.visibility != Visibility::Extensional {
            return Err(Error::AssertIntoIntensional(format!("{:?}", fact.predicate)));
        }
        if fact.arity() != decl.arity {
            return Err(Error::ArityMismatch {
                predicate: format!("{:?}", fact.predicate),
                expected: decl.arity,
                got: fact.arity(),
            });
        }
        for (i, (arg, ty)) in fact.args.iter().zip(decl.arg_types.iter()).enumerate() {
            if !ty.accepts(arg) {
                return Err(Error::TypeMismatch {
                    predicate: format!("{:?}", fact.predicate),
                    index: i,
                    expected: ty.name(),
                    got: arg.type_tag().to_string(),
                });
            }
            if let Some(Some(allowed)) = decl.arg_enums.get(i) {
                if let crate::term::Term::Atom(sym) = arg {
                    if !allowed.contains(sym) {
                        return Err(Error::EnumValueNotAllowed {
                            predicate: format!("{:?}", fact.predicate),
                            index: i,
                            allowed: allowed.iter().map(|s| format!("{s:?}")).collect(),
                            got: format!("{sym:?}"),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn retract_fact(&mut self, fact: &Fact) {
        if let Some(rel) = self.edb.get_mut(&fact.predicate) {
            if rel.remove(fact) {
                self.dirty = true;
            }
        }
    }

    pub fn retract_predicate(&mut self, predicate: Symbol) {
        if let Some(rel) = self.edb.get_mut(&predicate) {
            if !rel.is_empty() {
                rel.clear();
                self.dirty = true;
            }
        }
    }

    pub fn query(&self, predicate: Symbol) -> Vec<Fact> {
        let mut out: Vec<Fact> = self
            .edb
            .get(&predicate)
            .into_iter()
            .flatten()
            .cloned()
            .chain(self.idb.get(&predicate).into_iter().flatten().cloned())
            .collect();
        // Ordered sequence per the `query` contract; structural ordering is
        // stable even though the underlying sets are hashed.
        out.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
        out.dedup();
        out
    }

    pub fn edb(&self) -> &Relations {
        &self.edb
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_idb(&mut self, idb: Relations) {
        self.idb = idb;
        self.dirty = false;
    }

    pub fn idb(&self) -> &Relations {
        &self.idb
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            edb: self.edb.clone(),
            idb: self.idb.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.edb = snapshot.edb;
        self.idb = snapshot.idb;
        self.dirty = true;
    }
}
