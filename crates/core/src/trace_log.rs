//! The durable, append-only Trace Log (§6), distinct from `tracing`'s
//! ephemeral output: one newline-delimited JSON record per LLM call, rotated
//! by date and partitioned by category, plus a generic structured-event
//! record for non-LLM lifecycle logging that wants the same durability.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// §3's Trace entity: every LLM call, recorded once, regardless of whether
/// the call eventually contributed to a committed action or was discarded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmCallTrace {
    pub id: String,
    pub timestamp_ms: i64,
    pub shard: String,
    pub prompt_digest: String,
    pub response_digest: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub latency_ms: u64,
    pub cost_usd: f64,
}

impl LlmCallTrace {
    pub fn new(
        id: impl Into<String>,
        shard: impl Into<String>,
        prompt: &str,
        response: &str,
        tokens_in: u32,
        tokens_out: u32,
        latency_ms: u64,
        cost_usd: f64,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp_ms: Utc::now().timestamp_millis(),
            shard: shard.into(),
            prompt_digest: digest(prompt),
            response_digest: digest(response),
            tokens_in,
            tokens_out,
            latency_ms,
            cost_usd,
        }
    }
}

fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A structured lifecycle record, e.g. shard spawn/destroy, rule commit,
/// dispatch denial — the same field list as §6's trace log, but for events
/// that aren't themselves an LLM call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp_ms: i64,
    pub shard: String,
    pub category: String,
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl TraceEvent {
    pub fn new(shard: impl Into<String>, category: impl Into<String>, level: &str, message: impl Into<String>) -> Self {
        Self {
            timestamp_ms: Utc::now().timestamp_millis(),
            shard: shard.into(),
            category: category.into(),
            level: level.to_string(),
            message: message.into(),
            context: serde_json::Value::Null,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Appends NDJSON records into `dir/<category>-<date>.ndjson`, one file per
/// category per day. A `Mutex` per log instance is enough concurrency
/// control: every writer in this process goes through the same handle, and
/// the kernel's own write lock already serializes the operations that would
/// otherwise race to produce a trace record in the same turn.
pub struct TraceLog {
    dir: PathBuf,
    file_lock: Mutex<()>,
}

impl TraceLog {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            file_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, category: &str) -> PathBuf {
        let date = Utc::now().format("%Y-%m-%d");
        self.dir.join(format!("{category}-{date}.ndjson"))
    }

    fn append_line(&self, category: &str, line: &str) -> Result<()> {
        let _guard = self.file_lock.lock().unwrap();
        let path = self.path_for(category);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn record_llm_call(&self, trace: &LlmCallTrace) -> Result<()> {
        let line = serde_json::to_string(trace)?;
        self.append_line("llm_calls", &line)
    }

    pub fn record_event(&self, event: &TraceEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        self.append_line(&event.category, &line)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_call_digests_are_stable_for_identical_text() {
        let a = LlmCallTrace::new("1", "main", "prompt", "response", 10, 20, 5, 0.001);
        let b = LlmCallTrace::new("2", "main", "prompt", "response", 10, 20, 5, 0.001);
        assert_eq!(a.prompt_digest, b.prompt_digest);
        assert_eq!(a.response_digest, b.response_digest);
    }

    #[test]
    fn record_llm_call_appends_ndjson_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = TraceLog::new(dir.path()).unwrap();
        let trace = LlmCallTrace::new("1", "main", "p", "r", 1, 1, 1, 0.0);
        log.record_llm_call(&trace).unwrap();
        log.record_llm_call(&trace).unwrap();

        let date = Utc::now().format("%Y-%m-%d");
        let path = dir.path().join(format!("llm_calls-{date}.ndjson"));
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn events_partition_by_category_into_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let log = TraceLog::new(dir.path()).unwrap();
        log.record_event(&TraceEvent::new("main", "shard_lifecycle", "info", "spawned"))
            .unwrap();
        log.record_event(&TraceEvent::new("main", "rule_commit", "info", "committed"))
            .unwrap();

        let date = Utc::now().format("%Y-%m-%d");
        assert!(dir.path().join(format!("shard_lifecycle-{date}.ndjson")).exists());
        assert!(dir.path().join(format!("rule_commit-{date}.ndjson")).exists());
    }
}
