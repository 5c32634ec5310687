//! MCP server runner with stdio transport.

use std::path::PathBuf;

use rmcp::ServiceExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::tool_handler::AgentToolServer;

/// Configuration for the MCP server.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Working directory the agent operates against.
    pub working_dir: PathBuf,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl McpServerConfig {
    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = path.into();
        self
    }
}

fn stdio() -> (tokio::io::Stdin, tokio::io::Stdout) {
    (tokio::io::stdin(), tokio::io::stdout())
}

/// Run the MCP server with stdio transport. Blocks until the client
/// disconnects.
pub async fn run_mcp_server(config: McpServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    info!(
        "starting MCP server (working_dir={})",
        config.working_dir.display()
    );

    let server = AgentToolServer::new().with_working_dir(&config.working_dir);

    let running = server.serve(stdio()).await?;

    info!("MCP server running, waiting for client requests");

    running.waiting().await?;

    info!("MCP server shutting down");
    tokio::task::yield_now().await;

    Ok(())
}
