//! Configuration: a single `Config` loaded from TOML, `serde(default)` on
//! every field so a partial or empty file still boots, plus the environment
//! boundaries §6 requires be explicit fields rather than ambient env reads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_workspace_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".neurokernel")
}

fn default_trace_log_dir() -> PathBuf {
    default_config_dir().join("traces")
}

fn default_atom_store_path() -> PathBuf {
    default_config_dir().join("atoms.json")
}

fn default_tool_binary_dir() -> PathBuf {
    default_config_dir().join("tools")
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_vector_endpoint() -> String {
    "http://localhost:8088".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_token_budget() -> usize {
    8_000
}

fn default_per_rule_retry_cap() -> u32 {
    3
}

fn default_session_retry_cap() -> u32 {
    20
}

fn default_max_tool_calls() -> u32 {
    50
}

/// Environment boundaries (§6) plus budgets and timeouts, all overridable
/// from `~/.neurokernel/config.toml` by default and all defaulted so a
/// missing or partial file still produces a working config.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the filesystem workspace the dispatcher's handlers operate on.
    pub workspace_root: PathBuf,
    /// Directory the trace log writes its per-category, per-date NDJSON files to.
    pub trace_log_dir: PathBuf,
    /// Path to the persisted JIT Context Compiler atom store.
    pub atom_store_path: PathBuf,
    /// Directory Ouroboros-compiled tool binaries are registered under.
    pub tool_binary_dir: PathBuf,
    /// LLM endpoint (OpenAI-API-shaped; `api_base` for any compatible self-hosted target).
    pub llm_endpoint: String,
    /// Embedding service endpoint for the JIT Context Compiler's candidate retrieval.
    pub embedding_endpoint: String,
    /// Vector service endpoint for focus resolution's similarity candidates.
    pub vector_endpoint: String,
    pub model: String,
    pub llm_timeout_secs: u64,
    pub token_budget: usize,
    pub per_rule_retry_cap: u32,
    pub session_retry_cap: u32,
    pub max_tool_calls_per_shard: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            trace_log_dir: default_trace_log_dir(),
            atom_store_path: default_atom_store_path(),
            tool_binary_dir: default_tool_binary_dir(),
            llm_endpoint: default_llm_endpoint(),
            embedding_endpoint: default_embedding_endpoint(),
            vector_endpoint: default_vector_endpoint(),
            model: default_model(),
            llm_timeout_secs: default_llm_timeout_secs(),
            token_budget: default_token_budget(),
            per_rule_retry_cap: default_per_rule_retry_cap(),
            session_retry_cap: default_session_retry_cap(),
            max_tool_calls_per_shard: default_max_tool_calls(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to `Config::default()` if the file
    /// does not exist. A file that exists but fails to parse is an error:
    /// a missing config is silent-default, a broken one is not.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{path:?}: {e}")))
    }

    pub fn default_path() -> PathBuf {
        default_config_dir().join("config.toml")
    }
}

/// One diagnostic from validating a config TOML document before it is
/// actually loaded into a running `Config` — lets the cli surface several
/// problems from one file at once instead of stopping at the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

/// Parse `toml_src` and flag issues a silently-defaulted `Config` would
/// otherwise hide: an empty workspace root, a zero token budget, or a
/// session retry cap below the per-rule cap (which would make the first
/// rule proposal immediately exhaust the session budget).
pub fn validate_config_toml(toml_src: &str) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    let config: Config = match toml::from_str(toml_src) {
        Ok(c) => c,
        Err(e) => {
            issues.push(ConfigIssue {
                field: "<document>".to_string(),
                message: e.to_string(),
            });
            return issues;
        }
    };

    if config.workspace_root.as_os_str().is_empty() {
        issues.push(ConfigIssue {
            field: "workspace_root".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if config.token_budget == 0 {
        issues.push(ConfigIssue {
            field: "token_budget".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    if config.session_retry_cap < config.per_rule_retry_cap {
        issues.push(ConfigIssue {
            field: "session_retry_cap".to_string(),
            message: format!(
                "session_retry_cap ({}) is below per_rule_retry_cap ({}); the first rule proposal would exhaust the session budget",
                config.session_retry_cap, config.per_rule_retry_cap
            ),
        });
    }
    if config.llm_timeout_secs == 0 {
        issues.push(ConfigIssue {
            field: "llm_timeout_secs".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    issues
}
