//! The turn coordinator: one call to [`run_turn`] is one pass of §2's data
//! flow — Perception asserts facts, the kernel evaluates to fixpoint, every
//! derived `next_action` goes through the Dispatcher, the JIT Context
//! Compiler assembles the prompt for Articulation, and the resulting
//! control packet is applied back into the kernel. Every stage's failures
//! become facts rather than aborting the turn; only a kernel-level error
//! (a malformed rule, a type mismatch) propagates as `Err`.

use nsk_context::{AtomStore, CompiledPrompt};
use nsk_dispatcher::RouteOutcome;
use nsk_kernel::{Fact, Term};
use nsk_transducers::{ControlPacket, DualChannelReply};
use tracing::{info, warn};

use crate::error::Result;
use crate::state::AgentState;
use crate::trace_log::TraceEvent;

/// One turn's input: the raw utterance (user text, or a shard's own task
/// description when the coordinator is driving a shard rather than the
/// root session).
pub struct TurnInput {
    pub shard: String,
    pub user_text: String,
}

impl TurnInput {
    pub fn root(user_text: impl Into<String>) -> Self {
        Self {
            shard: "main".to_string(),
            user_text: user_text.into(),
        }
    }
}

/// One turn's result: the surface text to show the user, plus everything
/// that got dispatched along the way, for callers (cli, exec, tests) that
/// want more than just the reply.
#[derive(Debug)]
pub struct TurnOutput {
    pub surface_response: String,
    pub dispatched: Vec<RouteOutcome>,
    pub reply: DualChannelReply,
}

/// Run one turn against `state`. §8's scenarios (A: permitted write, B:
/// blocked dangerous command, F: clarification gate) all fall out of this
/// same sequence: a blocked or dream-unsafe action never reaches a
/// handler, it becomes an `execution_error` fact the next fixpoint and any
/// loaded rules can react to (e.g. by deriving `clarification_needed`)
/// before articulation ever runs.
pub async fn run_turn(state: &mut AgentState, input: TurnInput) -> Result<TurnOutput> {
    if input.user_text.trim().is_empty() {
        return Ok(TurnOutput {
            surface_response: String::new(),
            dispatched: Vec::new(),
            reply: DualChannelReply {
                surface_response: String::new(),
                control_packet: ControlPacket::default(),
            },
        });
    }

    let perceived = state.perception.transduce(&state.kernel, &input.user_text).await?;
    state.kernel.assert_batch(perceived)?;
    state.kernel.evaluate()?;

    let dispatched = dispatch_pending_actions(state, &input.shard).await?;
    state.kernel.evaluate()?;

    let compiled = compile_context(state, &input)?;

    let reply = state
        .articulation
        .generate(&compiled.text, &input.user_text)
        .await?;
    let applied = state.articulation.apply(&mut state.kernel, &reply)?;
    state.kernel.evaluate()?;

    state.trace_log.record_event(
        &TraceEvent::new(&input.shard, "turn", "info", "turn completed")
            .with_context(serde_json::json!({
                "actions_dispatched": dispatched.len(),
                "mangle_outcomes": applied.outcomes.len(),
            })),
    )?;

    Ok(TurnOutput {
        surface_response: applied.surface_response,
        dispatched,
        reply,
    })
}

/// Drain every pending `next_action` fact through the dispatcher. A
/// rejection (permission, block, dream-unsafe, no handler, execution
/// failure) is recorded as an `execution_error` fact rather than aborting
/// the turn — the next fixpoint, and the rules loaded into the kernel, get
/// to decide what that means.
async fn dispatch_pending_actions(state: &mut AgentState, shard: &str) -> Result<Vec<RouteOutcome>> {
    let next_action = state.kernel.symbols.intern("next_action");
    let pending = state.kernel.query(next_action);
    let mut outcomes = Vec::with_capacity(pending.len());

    for action in &pending {
        match state
            .dispatcher
            .route_action(&state.kernel.symbols, &state.kernel, action)
            .await
        {
            Ok(outcome) => {
                for fact in outcome.result_facts.clone() {
                    state.kernel.assert(fact)?;
                }
                info!(shard, action_id = %outcome.action_id, "action dispatched");
                outcomes.push(outcome);
            }
            Err(err) => {
                let action_id = action_id_of(action);
                warn!(shard, %action_id, %err, "action rejected before execution");
                let fact = err.to_fact(&state.kernel.symbols, &action_id);
                state.kernel.assert(fact)?;
                state.trace_log.record_event(&TraceEvent::new(
                    shard,
                    "dispatch_rejected",
                    "warn",
                    err.to_string(),
                ))?;
            }
        }
    }

    Ok(outcomes)
}

fn action_id_of(fact: &Fact) -> String {
    match fact.args.first() {
        Some(Term::Str(s)) => s.clone(),
        _ => "<unknown>".to_string(),
    }
}

/// Assemble the prompt for this turn's articulation call. With no atom
/// store wired in yet (seeded atoms are a deployment-time concern, not a
/// per-turn one) this compiles against an empty candidate set, which
/// still exercises the dynamic-slot assembly and the Piggyback directive.
fn compile_context(state: &mut AgentState, input: &TurnInput) -> Result<CompiledPrompt> {
    let store = AtomStore::new();
    let compiled = nsk_context::compile(
        &mut state.kernel,
        &store,
        &[],
        state.config.token_budget,
        &[("shard", &input.shard), ("user_text", &input.user_text)],
    )?;
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use nsk_transducers::ScriptedClient;
    use std::sync::Arc;

    #[tokio::test]
    async fn a_turn_with_no_actionable_intent_still_produces_a_surface_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.workspace_root = dir.path().to_path_buf();
        config.trace_log_dir = dir.path().join("traces");

        let llm = Arc::new(ScriptedClient::new(vec![
            r#"{"category":"/chat","verb":"/greet","target":null,"constraint":null,"focus_reference":null}"#
                .to_string(),
            r#"{"surface_response":"hello","control_packet":{}}"#.to_string(),
        ]));
        let mut state = AgentState::boot(config, llm).unwrap();

        let output = run_turn(&mut state, TurnInput::root("hello there")).await.unwrap();
        assert_eq!(output.surface_response, "hello");
        assert!(output.dispatched.is_empty());
    }

    #[tokio::test]
    async fn empty_input_turn_is_silent_and_never_calls_the_llm() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.workspace_root = dir.path().to_path_buf();
        config.trace_log_dir = dir.path().join("traces");

        // An empty response queue would fail the turn if perception or
        // articulation were invoked at all.
        let llm = Arc::new(ScriptedClient::new(vec![]));
        let mut state = AgentState::boot(config, llm).unwrap();

        let output = run_turn(&mut state, TurnInput::root("   ")).await.unwrap();
        assert_eq!(output.surface_response, "");
        assert!(output.dispatched.is_empty());
        assert!(output.reply.control_packet.mangle_updates.is_empty());

        let intent = state.kernel.symbols.intern("intent");
        assert!(state.kernel.query(intent).is_empty());
    }
}
