//! Config loading, logging init, and the glue that turns a [`nsk_core::Config`]
//! into a running [`nsk_core::Session`]. The binary (`src/main.rs`) is a thin
//! shell around what's here; no subcommand parsing or interactive rendering
//! lives in this crate, both being out of scope for this workspace.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use nsk_core::Config;
use nsk_transducers::{LlmClient, OpenAiClient};

/// Load config from `path` if given, else from [`Config::default_path`],
/// falling back to defaults if neither exists. Applies `working_dir` and
/// `model` overrides from the command line on top of whatever was loaded.
pub fn resolve_config(
    path: Option<&Path>,
    working_dir: Option<PathBuf>,
    model: Option<String>,
) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    if let Some(working_dir) = working_dir {
        config.workspace_root = working_dir;
    }
    if let Some(model) = model {
        config.model = model;
    }
    Ok(config)
}

/// Initialize `tracing` to log to stderr, honoring `RUST_LOG`. Idempotent:
/// a second call (e.g. under test) is silently ignored.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Build the LLM client the agent talks to. Reads `OPENAI_API_KEY` from the
/// environment; an empty key still constructs a client, and requests fail
/// at call time rather than at boot.
pub fn build_llm_client(config: &Config) -> Arc<dyn LlmClient> {
    let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
    Arc::new(OpenAiClient::new(
        api_key,
        Some(config.llm_endpoint.clone()),
        config.model.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_config_applies_overrides_on_top_of_defaults() {
        let config = resolve_config(
            Some(Path::new("/nonexistent/config.toml")),
            Some(PathBuf::from("/tmp/work")),
            Some("gpt-4o".to_string()),
        )
        .unwrap();
        assert_eq!(config.workspace_root, PathBuf::from("/tmp/work"));
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn resolve_config_with_no_overrides_keeps_defaults() {
        let default = Config::default();
        let config = resolve_config(Some(Path::new("/nonexistent/config.toml")), None, None).unwrap();
        assert_eq!(config.model, default.model);
    }
}
