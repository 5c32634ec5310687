//! Runner for exec mode: boot one `AgentState` from `ExecConfig`, run
//! exactly one turn against it, and report the result through an
//! `OutputHandler`.

use std::sync::Arc;

use nsk_core::{AgentState, Config, Event, TurnInput};
use nsk_transducers::{LlmClient, OpenAiClient};

use crate::config::{ExecConfig, OutputMode};
use crate::error::{ExecError, Result};
use crate::output::{ExecOutput, HumanOutputHandler, JsonOutputHandler, OutputHandler};

/// Result of one exec invocation.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub session_id: String,
    pub final_response: String,
    pub actions_dispatched: usize,
    pub status: String,
}

impl ExecResult {
    pub fn is_success(&self) -> bool {
        self.status == "complete"
    }
}

/// Run one turn in non-interactive exec mode, printing to stdout/stderr
/// according to `config.output_mode`.
pub async fn run_exec(config: ExecConfig) -> Result<ExecResult> {
    let handler: Arc<dyn OutputHandler> = match config.output_mode {
        OutputMode::Json => Arc::new(JsonOutputHandler::new(std::io::stdout())),
        OutputMode::Human => Arc::new(HumanOutputHandler::new(std::io::stderr(), config.verbose)),
    };
    run_exec_with_handler(config, handler).await
}

/// Run exec mode with a caller-supplied output handler, e.g. for tests or
/// for embedding exec mode inside another tool.
pub async fn run_exec_with_handler(
    config: ExecConfig,
    handler: Arc<dyn OutputHandler>,
) -> Result<ExecResult> {
    let session_id = config
        .session_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut agent_config = Config::default();
    agent_config.workspace_root = config.working_dir.clone();
    if let Some(model) = &config.model {
        agent_config.model = model.clone();
    }

    let llm = build_llm_client(&agent_config);
    let mut state = AgentState::boot(agent_config, llm)
        .map_err(|e| ExecError::InitializationFailed(e.to_string()))?;

    handler.handle_event(&Event::TurnStarted {
        submission_id: session_id.clone(),
    });

    let outcome = nsk_core::run_turn(
        &mut state,
        TurnInput {
            shard: "exec".to_string(),
            user_text: config.prompt.clone(),
        },
    )
    .await;

    let (final_response, actions_dispatched, status, event) = match outcome {
        Ok(output) => {
            let event = Event::TurnComplete {
                submission_id: session_id.clone(),
                surface_response: output.surface_response.clone(),
            };
            (
                output.surface_response,
                output.dispatched.len(),
                "complete".to_string(),
                event,
            )
        }
        Err(err) => {
            let event = Event::TurnFailed {
                submission_id: session_id.clone(),
                error: err.to_string(),
            };
            handler.handle_event(&event);
            return Err(ExecError::ExecutionFailed(err.to_string()));
        }
    };
    handler.handle_event(&event);

    let output = ExecOutput {
        session_id: session_id.clone(),
        final_response: final_response.clone(),
        actions_dispatched,
        status: status.clone(),
    };
    handler.print_final(&output);

    Ok(ExecResult {
        session_id,
        final_response,
        actions_dispatched,
        status,
    })
}

fn build_llm_client(config: &Config) -> Arc<dyn LlmClient> {
    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    Arc::new(OpenAiClient::new(
        api_key,
        Some(config.llm_endpoint.clone()),
        config.model.clone(),
    ))
}
