//! `AgentState`: the one place every long-lived service object is owned.
//! Built once at boot from a `Config`, passed explicitly into the turn
//! coordinator — no ambient statics, per §9's "global mutable state" note.

use std::sync::Arc;

use nsk_dispatcher::{Dispatcher, EffectRegistry};
use nsk_kernel::{bootstrap_rules, bootstrap_schema, Kernel, SymbolTable};
use nsk_shards::{boot_fact, ShardScheduler};
use nsk_transducers::{ArticulationTransducer, LlmClient, PerceptionTransducer};

use crate::config::Config;
use crate::error::Result;
use crate::trace_log::TraceLog;

/// Everything a turn needs, owned in one place and handed to
/// [`crate::turn::run_turn`] by `&mut` reference. Cloning a `Kernel` is
/// cheap (it is itself an `Arc`-backed arena); `AgentState` is not `Clone`
/// because the dispatcher, scheduler, and trace log are not meant to fork.
pub struct AgentState {
    pub config: Config,
    pub kernel: Kernel,
    pub dispatcher: Arc<Dispatcher>,
    pub scheduler: ShardScheduler,
    pub perception: PerceptionTransducer,
    pub articulation: ArticulationTransducer,
    pub trace_log: Arc<TraceLog>,
}

impl AgentState {
    /// Boot a kernel with the bootstrap schema and `/boot` fact, a
    /// dispatcher with the default filesystem/shell/git handlers rooted at
    /// `config.workspace_root`, and an empty shard scheduler sharing the
    /// same schema. `llm` is injected so callers can swap in a scripted
    /// client for tests without touching any of the wiring below.
    pub fn boot(config: Config, llm: Arc<dyn LlmClient>) -> Result<Self> {
        let symbols = SymbolTable::new();
        let schema = bootstrap_schema(&symbols);
        let mut kernel = Kernel::new(symbols.clone(), schema.clone());
        kernel.assert(boot_fact(&symbols))?;
        for rule in bootstrap_rules() {
            kernel.hot_load_rule(rule)?;
        }
        for rule in nsk_dispatcher::bootstrap_panic_rules() {
            kernel.hot_load_rule(rule)?;
        }

        let mut registry = EffectRegistry::new();
        registry.register_handler(Arc::new(
            nsk_dispatcher::handlers::fs::FileWriteHandler::new(&config.workspace_root),
        ));
        registry.register_predicate(Arc::new(
            nsk_dispatcher::handlers::fs::FileContentPredicate::new(&config.workspace_root),
        ));
        registry.register_handler(Arc::new(nsk_dispatcher::handlers::shell::ShellExecHandler::new(
            &config.workspace_root,
        )));
        registry.register_handler(Arc::new(nsk_dispatcher::handlers::git::GitCommitHandler::new(
            &config.workspace_root,
        )));

        let dispatcher = Arc::new(Dispatcher::new(registry));
        let scheduler = ShardScheduler::new(symbols.clone(), schema, dispatcher.clone());

        let perception = PerceptionTransducer::new(
            llm.clone(),
            Arc::new(nsk_transducers::NullSimilarityService),
        );
        let articulation = ArticulationTransducer::new(llm);

        let trace_log = Arc::new(TraceLog::new(&config.trace_log_dir)?);

        Ok(Self {
            config,
            kernel,
            dispatcher,
            scheduler,
            perception,
            articulation,
            trace_log,
        })
    }
}
