//! MCP server handler implementing the `agent_turn` tool: one call runs
//! one turn of the kernel-driven agent and returns its surface response.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, JsonObject, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::ErrorData as McpError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use nsk_exec::{run_exec, ExecConfig, OutputMode};

/// Arguments for the `agent_turn` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentTurnArgs {
    /// The prompt/instruction for the agent.
    pub prompt: String,

    /// Working directory for file operations (optional).
    #[serde(default)]
    pub working_dir: Option<String>,

    /// Model to use (optional, defaults to the server's configured model).
    #[serde(default)]
    pub model: Option<String>,
}

/// Result content from the `agent_turn` tool.
#[derive(Debug, Clone, Serialize)]
pub struct AgentTurnResult {
    pub response: String,
    pub actions_dispatched: usize,
    pub status: String,
}

/// MCP server handler that exposes one kernel-driven agent turn as a tool.
#[derive(Clone)]
pub struct AgentToolServer {
    pub working_dir: PathBuf,
}

impl AgentToolServer {
    pub fn new() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_default(),
        }
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = path.into();
        self
    }

    fn agent_turn_tool() -> Tool {
        let schema: JsonObject = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "The coding task or question to send to the agent"
                },
                "working_dir": {
                    "type": "string",
                    "description": "Working directory for file operations (optional)"
                },
                "model": {
                    "type": "string",
                    "description": "LLM model to use (optional)"
                }
            },
            "required": ["prompt"],
            "additionalProperties": false
        }))
        .expect("agent_turn tool schema should deserialize");

        Tool::new(
            Cow::Borrowed("agent_turn"),
            Cow::Borrowed(
                "Run one turn of the kernel-driven coding agent. The agent can read/write \
                files, execute shell commands, and commit through its constitutional gate. \
                Returns the agent's surface response and how many actions it dispatched.",
            ),
            Arc::new(schema),
        )
    }

    async fn execute_agent_turn(&self, args: AgentTurnArgs) -> Result<AgentTurnResult, String> {
        let working_dir = args
            .working_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| self.working_dir.clone());

        let mut config = ExecConfig::new(&args.prompt)
            .with_working_dir(working_dir)
            .with_output_mode(OutputMode::Json);
        if let Some(model) = &args.model {
            config = config.with_model(model);
        }

        let result = run_exec(config).await.map_err(|e| e.to_string())?;

        Ok(AgentTurnResult {
            response: result.final_response,
            actions_dispatched: result.actions_dispatched,
            status: result.status,
        })
    }
}

impl Default for AgentToolServer {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::manual_async_fn)]
impl ServerHandler for AgentToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_tool_list_changed()
                .build(),
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            Ok(ListToolsResult {
                tools: vec![Self::agent_turn_tool()],
                next_cursor: None,
            })
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        info!("MCP tool call: {}", request.name);

        match request.name.as_ref() {
            "agent_turn" => {
                let args: AgentTurnArgs = match request.arguments {
                    Some(arguments) => serde_json::from_value(serde_json::Value::Object(
                        arguments.into_iter().collect(),
                    ))
                    .map_err(|err| McpError::invalid_params(err.to_string(), None))?,
                    None => {
                        return Err(McpError::invalid_params(
                            "missing arguments for agent_turn tool; 'prompt' is required",
                            None,
                        ));
                    }
                };

                info!("executing agent_turn with prompt: {}", args.prompt);

                match self.execute_agent_turn(args).await {
                    Ok(result) => {
                        let structured = json!({
                            "response": result.response,
                            "actions_dispatched": result.actions_dispatched,
                            "status": result.status,
                        });

                        Ok(CallToolResult {
                            content: vec![Content::text(result.response)],
                            structured_content: Some(structured),
                            is_error: Some(false),
                            meta: None,
                        })
                    }
                    Err(e) => {
                        error!("agent_turn execution failed: {}", e);
                        Ok(CallToolResult {
                            content: vec![Content::text(format!("Error: {e}"))],
                            structured_content: None,
                            is_error: Some(true),
                            meta: None,
                        })
                    }
                }
            }
            other => Err(McpError::invalid_params(format!("unknown tool: {other}"), None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_tool_server_creation() {
        let server = AgentToolServer::new();
        assert!(server.working_dir.as_os_str().len() > 0);
    }

    #[test]
    fn test_agent_tool_server_with_working_dir() {
        let server = AgentToolServer::new().with_working_dir("/tmp");
        assert_eq!(server.working_dir, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_agent_turn_tool_definition() {
        let tool = AgentToolServer::agent_turn_tool();
        assert_eq!(tool.name.as_ref(), "agent_turn");
        assert!(tool.description.is_some());
    }

    #[test]
    fn test_server_info_enables_tools() {
        let server = AgentToolServer::new();
        let info = server.get_info();
        assert!(info.capabilities.tools.is_some());
    }

    #[test]
    fn test_agent_turn_args_deserialization_minimal() {
        let json = r#"{"prompt": "test prompt"}"#;
        let args: AgentTurnArgs = serde_json::from_str(json).unwrap();
        assert_eq!(args.prompt, "test prompt");
        assert!(args.working_dir.is_none());
        assert!(args.model.is_none());
    }

    #[test]
    fn test_agent_turn_args_deserialization_full() {
        let json = r#"{
            "prompt": "code task",
            "working_dir": "/tmp/work",
            "model": "gpt-4o-mini"
        }"#;
        let args: AgentTurnArgs = serde_json::from_str(json).unwrap();
        assert_eq!(args.prompt, "code task");
        assert_eq!(args.working_dir, Some("/tmp/work".to_string()));
        assert_eq!(args.model, Some("gpt-4o-mini".to_string()));
    }

    #[test]
    fn test_agent_turn_result_serialization() {
        let result = AgentTurnResult {
            response: "Done!".to_string(),
            actions_dispatched: 2,
            status: "complete".to_string(),
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("Done!"));
        assert!(json.contains("\"actions_dispatched\":2"));
        assert!(json.contains("complete"));
    }

    #[test]
    fn test_agent_turn_schema_has_required_prompt() {
        let tool = AgentToolServer::agent_turn_tool();
        let schema_json = serde_json::to_string(&*tool.input_schema).unwrap();
        assert!(schema_json.contains("\"required\":[\"prompt\"]"));
    }
}
