//! Ouroboros: tool proposal. Derives a tool contract from `missing_tool_for`
//! facts, generates an implementation via the Feedback Loop pattern, runs a
//! static audit, sandbox-compiles the candidate, and hands it to Thunderdome
//! before it may be registered.

use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use nsk_kernel::{Fact, SymbolTable, Term};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::{AutopoiesisError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub input_shape: String,
    pub output_shape: String,
    pub capability: String,
}

/// Parse a `missing_tool_for(intent, capability)` fact into a starter
/// contract. Input/output shapes aren't carried by the fact itself, so they
/// default to the generic byte-stream shape every Ouroboros-generated tool
/// is expected to speak; a richer spec can refine them before code
/// generation runs.
pub fn derive_spec(fact: &Fact, table: &SymbolTable) -> Option<ToolSpec> {
    let intent = match fact.args.first()? {
        Term::Atom(a) => table.resolve(*a).to_string(),
        _ => return None,
    };
    let capability = match fact.args.get(1)? {
        Term::Atom(a) => table.resolve(*a).to_string(),
        _ => return None,
    };
    Some(ToolSpec {
        name: format!("tool_{intent}"),
        input_shape: "bytes".to_string(),
        output_shape: "bytes".to_string(),
        capability,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Violation {
    pub kind: &'static str,
    pub severity: Severity,
    pub detail: String,
}

struct AuditRule {
    kind: &'static str,
    severity: Severity,
    pattern: &'static str,
}

const AUDIT_RULES: &[AuditRule] = &[
    AuditRule { kind: "forbidden_import", severity: Severity::Error, pattern: r"use\s+std::net::" },
    AuditRule { kind: "dangerous_call", severity: Severity::Error, pattern: r"\bstd::fs::remove_dir_all\b" },
    AuditRule { kind: "unsafe_pointer", severity: Severity::Error, pattern: r"\bunsafe\s*\{" },
    AuditRule { kind: "reflection", severity: Severity::Error, pattern: r"\bstd::any::Any\b" },
    AuditRule { kind: "subprocess", severity: Severity::Error, pattern: r"\bstd::process::Command\b|\btokio::process::Command\b" },
    AuditRule { kind: "unchecked_panic", severity: Severity::Warning, pattern: r"\.unwrap\(\)|\.expect\(" },
    AuditRule { kind: "leaked_task", severity: Severity::Warning, pattern: r"\btokio::spawn\b" },
];

fn audit_regex(pattern: &'static str) -> Regex {
    static CACHE: OnceLock<std::sync::Mutex<HashMap<&'static str, Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| std::sync::Mutex::new(HashMap::new()));
    let mut guard = cache.lock().unwrap();
    guard
        .entry(pattern)
        .or_insert_with(|| Regex::new(pattern).unwrap())
        .clone()
}

/// Extract syntax-tree-equivalent facts from candidate source and check them
/// against the fixed safety policy above. A real implementation would walk a
/// `tree-sitter` parse tree; the regex pass here covers the same fixed rule
/// set the policy enumerates without needing a language-specific grammar for
/// whatever target the candidate was generated in.
pub fn static_audit(source: &str) -> Vec<Violation> {
    AUDIT_RULES
        .iter()
        .filter_map(|rule| {
            let re = audit_regex(rule.pattern);
            re.find(source).map(|m| Violation {
                kind: rule.kind,
                severity: rule.severity,
                detail: m.as_str().to_string(),
            })
        })
        .collect()
}

pub fn audit_passes(violations: &[Violation]) -> bool {
    !violations.iter().any(|v| v.severity >= Severity::Error)
}

/// Compiles a candidate tool's source into an isolated artifact directory.
/// The concrete backend shells out; tests use a null backend that simulates
/// success/failure without invoking a toolchain.
#[async_trait]
pub trait CompileBackend: Send + Sync {
    async fn compile(&self, source: &str, workdir: &Path) -> Result<PathBuf>;
}

/// Shells to `rustc` with an explicit, whitelisted environment — no
/// inherited environment variables beyond the ones named here, matching the
/// "single build-config source of truth" requirement.
pub struct RustcCompileBackend {
    env_whitelist: Vec<(String, String)>,
    timeout: Duration,
}

impl RustcCompileBackend {
    pub fn new(env_whitelist: Vec<(String, String)>) -> Self {
        Self {
            env_whitelist,
            timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl CompileBackend for RustcCompileBackend {
    async fn compile(&self, source: &str, workdir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(workdir)
            .await
            .map_err(|e| AutopoiesisError::CompilationFailed(e.to_string()))?;
        let source_path = workdir.join("candidate.rs");
        let artifact_path = workdir.join("candidate");
        tokio::fs::write(&source_path, source)
            .await
            .map_err(|e| AutopoiesisError::CompilationFailed(e.to_string()))?;

        let mut command = Command::new("rustc");
        command.env_clear();
        for (k, v) in &self.env_whitelist {
            command.env(k, v);
        }
        command.arg(&source_path).arg("-o").arg(&artifact_path);

        let output = timeout(self.timeout, command.output())
            .await
            .map_err(|_| AutopoiesisError::CompilationFailed("compile timed out".to_string()))?
            .map_err(|e| AutopoiesisError::CompilationFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(AutopoiesisError::CompilationFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(artifact_path)
    }
}

/// Test/dev backend: never shells out, just writes the source and reports
/// success unless the source is empty.
#[derive(Default)]
pub struct NullCompileBackend;

#[async_trait]
impl CompileBackend for NullCompileBackend {
    async fn compile(&self, source: &str, workdir: &Path) -> Result<PathBuf> {
        if source.trim().is_empty() {
            return Err(AutopoiesisError::CompilationFailed("empty source".to_string()));
        }
        tokio::fs::create_dir_all(workdir)
            .await
            .map_err(|e| AutopoiesisError::CompilationFailed(e.to_string()))?;
        let path = workdir.join("candidate.rs");
        tokio::fs::write(&path, source)
            .await
            .map_err(|e| AutopoiesisError::CompilationFailed(e.to_string()))?;
        Ok(path)
    }
}

#[derive(Debug, Clone)]
pub struct OuroborosOutcome {
    pub spec: ToolSpec,
    pub artifact_path: PathBuf,
    pub violations: Vec<Violation>,
    pub battle_hardened: bool,
}

/// Run the specification → audit → sandbox-compile phases (Thunderdome is a
/// separate step — see `thunderdome::run_against_armory` — because it needs
/// a `Shard`-driven Nemesis, which this module has no dependency on).
pub async fn generate_and_harden(
    spec: &ToolSpec,
    source: &str,
    backend: &dyn CompileBackend,
    workdir: &Path,
) -> Result<OuroborosOutcome> {
    let violations = static_audit(source);
    if !audit_passes(&violations) {
        warn!(tool = %spec.name, ?violations, "static audit rejected candidate tool");
        return Err(AutopoiesisError::AuditRejected(format!(
            "{} error-severity violation(s)",
            violations.iter().filter(|v| v.severity == Severity::Error).count()
        )));
    }

    let artifact_path = backend.compile(source, workdir).await?;
    info!(tool = %spec.name, path = %artifact_path.display(), "candidate tool compiled");

    Ok(OuroborosOutcome {
        spec: spec.clone(),
        artifact_path,
        violations,
        battle_hardened: false,
    })
}

/// `tool_registered(name, path, capability)`, asserted once Thunderdome has
/// marked the candidate `battle_hardened`.
pub fn tool_registered_fact(table: &SymbolTable, outcome: &OuroborosOutcome) -> Option<Fact> {
    if !outcome.battle_hardened {
        return None;
    }
    Some(Fact::new(
        table.intern("tool_registered"),
        vec![
            Term::Str(outcome.spec.name.clone()),
            Term::Str(outcome.artifact_path.display().to_string()),
            Term::Atom(table.intern(&outcome.spec.capability)),
        ],
    ))
}
