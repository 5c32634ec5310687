//! The `ShardScheduler`: factory registry, spawn/execute/destroy, and
//! delegation between shards.

use nsk_dispatcher::Dispatcher;
use nsk_kernel::{Fact, Kernel, Schema, SymbolTable, Term};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, ShardError};
use crate::ooda::{self, OodaLimits, OodaOutcome};
use crate::policy::default_policy_for;
use crate::shard::{Lifecycle, Shard, ShardKind, ShardLifetime};

/// Builds a shard's starting policy (rules + allowed tools) for a kind. The
/// default implementation is `default_policy_for`; callers register their
/// own factory to override it for a specific kind.
pub type Factory = Arc<dyn Fn(&ShardKind) -> crate::policy::ShardPolicy + Send + Sync>;

pub struct ShardConfig {
    pub lifetime: ShardLifetime,
    pub limits: OodaLimits,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            lifetime: ShardLifetime::Ephemeral,
            limits: OodaLimits::default(),
        }
    }
}

pub struct ShardScheduler {
    symbols: SymbolTable,
    parent_schema: Schema,
    dispatcher: Arc<Dispatcher>,
    factories: FxHashMap<String, Factory>,
    shards: FxHashMap<String, Shard>,
}

impl ShardScheduler {
    pub fn new(symbols: SymbolTable, parent_schema: Schema, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            symbols,
            parent_schema,
            dispatcher,
            factories: FxHashMap::default(),
            shards: FxHashMap::default(),
        }
    }

    pub fn register_factory(&mut self, kind: ShardKind, factory: Factory) {
        self.factories.insert(kind.as_str().to_string(), factory);
    }

    fn policy_for(&self, kind: &ShardKind) -> crate::policy::ShardPolicy {
        match self.factories.get(kind.as_str()) {
            Some(factory) => factory(kind),
            None => default_policy_for(kind),
        }
    }

    /// Allocate a child kernel sharing the parent's core schema but with its
    /// own, empty, extensional fact space, load the kind's policy rules, and
    /// set `allowed_tools`.
    pub fn spawn(&mut self, kind: ShardKind, config: ShardConfig) -> Result<String> {
        let policy = self.policy_for(&kind);
        let mut kernel = Kernel::new(self.symbols.clone(), self.parent_schema.clone());
        for rule in &policy.rules {
            kernel.hot_load_rule(rule)?;
        }

        let id = Uuid::new_v4().to_string();
        let mut shard = Shard {
            id: id.clone(),
            kind: kind.clone(),
            lifetime: config.lifetime,
            lifecycle: Lifecycle::Created,
            kernel,
            allowed_tools: policy.allowed_tools,
        };
        shard.transition(Lifecycle::Initialized);
        info!(shard = %id, kind = %kind, "shard spawned");
        self.shards.insert(id.clone(), shard);
        Ok(id)
    }

    /// Run a shard's OODA loop against a task's facts.
    pub async fn execute(&mut self, shard_id: &str, task: Vec<Fact>) -> Result<OodaOutcome> {
        let limits = OodaLimits::default();
        let shard = self
            .shards
            .get_mut(shard_id)
            .ok_or_else(|| ShardError::NotFound(shard_id.to_string()))?;

        shard.transition(Lifecycle::Running);
        let outcome = ooda::run(shard, &self.dispatcher, task, limits).await;

        match &outcome {
            Ok(_) => shard.transition(Lifecycle::Completed),
            Err(_) => shard.transition(Lifecycle::Failed),
        }
        outcome
    }

    /// Tear down an ephemeral shard. Persistent and system shards are exempt;
    /// system shards skip `destroyed` entirely per §4.4's invariant.
    pub fn destroy(&mut self, shard_id: &str) -> Result<()> {
        let shard = self
            .shards
            .get(shard_id)
            .ok_or_else(|| ShardError::NotFound(shard_id.to_string()))?;
        match shard.lifetime {
            ShardLifetime::Ephemeral => {
                let mut shard = self.shards.remove(shard_id).unwrap();
                shard.transition(Lifecycle::Destroyed);
                Ok(())
            }
            ShardLifetime::Persistent => Err(ShardError::DestroyRefused(
                shard_id.to_string(),
                "persistent shards are exempt from destroy",
            )),
            ShardLifetime::System => Err(ShardError::DestroyRefused(
                shard_id.to_string(),
                "system shards are exempt from destroy",
            )),
        }
    }

    /// Delegate a task from one shard to another, spawning the target kind
    /// if it doesn't already have a live shard to reuse. Asserts
    /// `delegate_task` into the parent kernel's fact stream via the returned
    /// fact so the caller can fold it into its own evaluation.
    pub async fn delegate(
        &mut self,
        from_shard: &str,
        to_kind: ShardKind,
        task: Vec<Fact>,
    ) -> Result<OodaOutcome> {
        if !self.shards.contains_key(from_shard) {
            return Err(ShardError::NotFound(from_shard.to_string()));
        }

        let target_id = match self.find_reusable(&to_kind) {
            Some(id) => id,
            None => self.spawn(to_kind.clone(), ShardConfig::default())?,
        };

        match self.execute(&target_id, task).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(from = from_shard, to = %to_kind, error = %e, "delegation failed");
                Err(ShardError::DelegationFailed {
                    kind: to_kind.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn find_reusable(&self, kind: &ShardKind) -> Option<String> {
        self.shards
            .values()
            .find(|s| {
                &s.kind == kind
                    && s.lifetime != ShardLifetime::Ephemeral
                    && s.lifecycle != Lifecycle::Destroyed
            })
            .map(|s| s.id.clone())
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn lifecycle_of(&self, shard_id: &str) -> Option<Lifecycle> {
        self.shards.get(shard_id).map(|s| s.lifecycle)
    }
}

pub fn boot_fact(table: &SymbolTable) -> Fact {
    Fact::new(table.intern("boot_phase"), vec![Term::Atom(table.intern("boot"))])
}
