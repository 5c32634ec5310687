//! MCP types for tool definitions and results

use serde::{Deserialize, Serialize};

/// Prefix for MCP tool names
pub const MCP_TOOL_PREFIX: &str = "mcp";
/// Delimiter between parts of MCP tool names
pub const MCP_TOOL_DELIMITER: &str = "__";

/// An MCP tool definition
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct McpTool {
    /// Qualified tool name (`mcp__<server>__<tool>`)
    pub qualified_name: String,
    /// Original tool name from the server
    pub name: String,
    /// Server name
    pub server: String,
    /// Tool description
    pub description: Option<String>,
    /// JSON schema for input parameters
    pub input_schema: serde_json::Value,
}

impl McpTool {
    /// Create a new MCP tool
    pub fn new(
        server: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        let server = server.into();
        let name = name.into();
        let qualified_name = format!(
            "{}{}{}{}{}",
            MCP_TOOL_PREFIX, MCP_TOOL_DELIMITER, server, MCP_TOOL_DELIMITER, name
        );
        Self {
            qualified_name,
            name,
            server,
            description,
            input_schema,
        }
    }
}

/// Result of an MCP tool call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct McpToolResult {
    /// Content blocks returned by the tool
    pub content: Vec<McpContent>,
    /// Whether the tool call resulted in an error
    pub is_error: bool,
}

impl McpToolResult {
    /// Create a successful text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Create an error result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// Content returned by MCP tools
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpContent {
    /// Text content
    Text { text: String },
    /// Image content (base64 encoded)
    Image { data: String, mime_type: String },
    /// Resource content
    Resource { uri: String, text: Option<String> },
}

/// Parse an MCP qualified tool name into (server, tool) parts
///
/// Format: `mcp__<server>__<tool>`
pub fn parse_qualified_tool_name(qualified_name: &str) -> Option<(String, String)> {
    let mut parts = qualified_name.split(MCP_TOOL_DELIMITER);

    // Check prefix is "mcp"
    let prefix = parts.next()?;
    if prefix != MCP_TOOL_PREFIX {
        return None;
    }

    // Get server name
    let server = parts.next()?;
    if server.is_empty() {
        return None;
    }

    // Get tool name (may contain delimiters)
    let tool: String = parts.collect::<Vec<_>>().join(MCP_TOOL_DELIMITER);
    if tool.is_empty() {
        return None;
    }

    Some((server.to_string(), tool))
}

/// Check if a tool name is an MCP tool
pub fn is_mcp_tool(name: &str) -> bool {
    name.starts_with(&format!("{}{}", MCP_TOOL_PREFIX, MCP_TOOL_DELIMITER))
}
