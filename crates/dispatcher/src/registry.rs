//! The handler and virtual-predicate registries a `Dispatcher` is built
//! from. Kept as plain maps rather than a trait-object graph: capability
//! classes are data (declared by schema), and a handler is just "the thing
//! that answers for this one action kind or predicate name".

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::action::{EffectHandler, VirtualPredicate};

#[derive(Default, Clone)]
pub struct EffectRegistry {
    handlers: FxHashMap<String, Arc<dyn EffectHandler>>,
    predicates: FxHashMap<String, Arc<dyn VirtualPredicate>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EffectHandler>) {
        self.handlers.insert(handler.kind().to_string(), handler);
    }

    pub fn register_predicate(&mut self, predicate: Arc<dyn VirtualPredicate>) {
        self.predicates
            .insert(predicate.predicate().to_string(), predicate);
    }

    pub fn handler(&self, kind: &str) -> Option<Arc<dyn EffectHandler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn predicate(&self, name: &str) -> Option<Arc<dyn VirtualPredicate>> {
        self.predicates.get(name).cloned()
    }
}
