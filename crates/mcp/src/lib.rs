//! Model Context Protocol (MCP) client support for connecting to external tool servers.
//! Backs the dispatcher's `mcp_tool_result` virtual predicate: one registered
//! client per configured server, tool calls routed through it and their
//! results asserted back as facts.

mod client;
mod config;
mod error;
mod types;

pub use client::McpClient;
pub use config::{McpServerConfig, McpTransport};
pub use error::McpError;
pub use types::{
    is_mcp_tool, parse_qualified_tool_name, McpContent, McpTool, McpToolResult, MCP_TOOL_DELIMITER,
    MCP_TOOL_PREFIX,
};
