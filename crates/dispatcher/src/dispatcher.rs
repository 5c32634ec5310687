//! The `Dispatcher`: the single gate through which every side effect
//! passes. `route_action` runs the full constitutional gate (permission,
//! blocks, Dreamer) before ever touching a concrete handler; `get_facts`
//! lazily resolves virtual predicates for the engine.

use nsk_kernel::{Fact, Kernel, SymbolTable, Term};
use tracing::{error, info, warn};

use crate::action::ActionRequest;
use crate::dreamer::Dreamer;
use crate::error::{DispatchError, Result};
use crate::gate;
use crate::registry::EffectRegistry;

pub struct Dispatcher {
    registry: EffectRegistry,
    dreamer: Dreamer,
}

#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub action_id: String,
    pub result_facts: Vec<Fact>,
}

impl Dispatcher {
    pub fn new(registry: EffectRegistry) -> Self {
        Self {
            registry,
            dreamer: Dreamer::default(),
        }
    }

    pub fn with_dreamer(mut self, dreamer: Dreamer) -> Self {
        self.dreamer = dreamer;
        self
    }

    /// Consume a `next_action(id, kind, args...)` fact: validate permission,
    /// run the Dreamer, and if safe, invoke the concrete handler. Every
    /// rejection is reported as a typed `DispatchError`, never a panic — the
    /// caller is expected to turn it into an `execution_error` fact via
    /// `DispatchError::to_fact` and re-assert it so the kernel can react.
    pub async fn route_action(
        &self,
        table: &SymbolTable,
        kernel: &Kernel,
        action: &Fact,
    ) -> Result<RouteOutcome> {
        let request = ActionRequest::from_fact(action, table).ok_or_else(|| {
            DispatchError::Execution {
                stage: "parse".into(),
                reason: "next_action fact did not match (id, kind, args...) shape".into(),
            }
        })?;

        gate::check_permitted(kernel, &request)?;
        gate::check_blocks(kernel)?;

        let dream = self.dreamer.simulate(kernel, &request);
        if dream.unsafe_ {
            let reason = dream.reason.unwrap_or_else(|| "unspecified panic_state".to_string());
            error!(action = %request.kind, %reason, "dreamer rejected action before dispatch");
            return Err(DispatchError::DreamUnsafe(reason));
        }

        let handler = self
            .registry
            .handler(&request.kind)
            .ok_or_else(|| DispatchError::NoHandler(request.kind.clone()))?;

        info!(action = %request.kind, id = %request.id, "dispatching action");
        let result_facts = handler.execute(table, &request).await?;
        Ok(RouteOutcome {
            action_id: request.id,
            result_facts,
        })
    }

    /// Resolve facts for a virtual predicate on demand. Bindings are the
    /// caller-supplied ground arguments the engine wants facts for (e.g. a
    /// path for `file_content`); an unregistered predicate resolves to no
    /// facts rather than an error, matching "lazy: only invoked when the
    /// engine actually needs facts for that predicate."
    pub async fn get_facts(
        &self,
        table: &SymbolTable,
        predicate: &str,
        bindings: &[Term],
    ) -> Result<Vec<Fact>> {
        match self.registry.predicate(predicate) {
            Some(handler) => handler.get_facts(table, bindings).await,
            None => {
                warn!(predicate, "no virtual predicate handler registered");
                Ok(Vec::new())
            }
        }
    }
}
