//! The per-shard OODA loop: observe task facts, orient by querying
//! `active_strategy`, decide by querying `next_action` in the child kernel,
//! act by delegating the chosen action back through the dispatcher.

use nsk_dispatcher::Dispatcher;
use nsk_kernel::Fact;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::Result;
use crate::shard::Shard;

#[derive(Clone, Copy, Debug)]
pub struct OodaLimits {
    pub max_tool_calls: usize,
    pub max_duration: Duration,
}

impl Default for OodaLimits {
    fn default() -> Self {
        Self {
            max_tool_calls: 25,
            max_duration: Duration::from_secs(120),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    NoNextAction,
    MaxToolCalls,
    MaxDuration,
}

#[derive(Debug)]
pub struct OodaOutcome {
    pub tool_calls: usize,
    pub termination: Termination,
    pub result_facts: Vec<Fact>,
}

/// Run one shard's OODA loop against `task_facts` until it runs out of
/// `next_action`s to decide on, or a bound is hit. Every action taken is
/// routed through the dispatcher, never performed directly by this loop.
pub async fn run(
    shard: &mut Shard,
    dispatcher: &Dispatcher,
    task_facts: Vec<Fact>,
    limits: OodaLimits,
) -> Result<OodaOutcome> {
    let table = shard.kernel.symbols.clone();

    // Observe.
    for fact in task_facts {
        shard.kernel.assert(fact)?;
    }
    shard.kernel.evaluate()?;

    let active_strategy = table.intern("active_strategy");
    let next_action = table.intern("next_action");

    let started = Instant::now();
    let mut tool_calls = 0usize;
    let mut result_facts = Vec::new();

    loop {
        if tool_calls >= limits.max_tool_calls {
            warn!(shard = %shard.id, tool_calls, "ooda loop hit max_tool_calls");
            return Ok(OodaOutcome {
                tool_calls,
                termination: Termination::MaxToolCalls,
                result_facts,
            });
        }
        if started.elapsed() >= limits.max_duration {
            warn!(shard = %shard.id, elapsed = ?started.elapsed(), "ooda loop hit max_duration");
            return Ok(OodaOutcome {
                tool_calls,
                termination: Termination::MaxDuration,
                result_facts,
            });
        }

        // Orient: the strategy query result isn't consumed here directly — it
        // exists so the child kernel's rules can gate which next_action facts
        // get derived in the first place.
        let _strategy = shard.kernel.query(active_strategy);

        // Decide.
        let pending = shard.kernel.query(next_action);
        let Some(action) = pending.first().cloned() else {
            debug!(shard = %shard.id, tool_calls, "ooda loop has no pending next_action, stopping");
            return Ok(OodaOutcome {
                tool_calls,
                termination: Termination::NoNextAction,
                result_facts,
            });
        };

        // Act.
        shard.kernel.retract_fact(&action);
        let outcome = dispatcher
            .route_action(&table, &shard.kernel, &action)
            .await?;
        tool_calls += 1;
        shard.kernel.assert_batch(outcome.result_facts.clone())?;
        result_facts.extend(outcome.result_facts);
        shard.kernel.evaluate()?;
    }
}
