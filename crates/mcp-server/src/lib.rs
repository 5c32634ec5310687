//! MCP server exposing the kernel-driven coding agent as a single tool.
//!
//! ## Usage
//!
//! Run as an MCP server (stdio transport):
//! ```bash
//! nsk mcp-server
//! ```
//!
//! The server exposes one tool:
//! - `agent_turn`: run one turn of the agent with a prompt

mod server;
mod tool_handler;

pub use server::{run_mcp_server, McpServerConfig};
pub use tool_handler::{AgentToolServer, AgentTurnArgs, AgentTurnResult};
