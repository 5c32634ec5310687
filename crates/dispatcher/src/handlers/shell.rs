//! Shell execution capability: the `/shell_exec` action kind and the
//! `shell_exec_result` virtual predicate.
//!
//! Grounded in the teacher's `core::exec`/`core::spawn` process-spawning
//! machinery, reduced to the shape the dispatcher actually needs: a timeout,
//! captured stdout/stderr/exit code, and nothing that bypasses the gate —
//! this handler never runs until `permitted`/`block_*`/Dreamer have all
//! already cleared the request.

use async_trait::async_trait;
use nsk_kernel::{Fact, SymbolTable, Term};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::action::{ActionRequest, EffectHandler};
use crate::error::{DispatchError, Result};

pub struct ShellExecHandler {
    working_dir: std::path::PathBuf,
    default_timeout: Duration,
}

impl ShellExecHandler {
    pub fn new(working_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            default_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

#[async_trait]
impl EffectHandler for ShellExecHandler {
    fn kind(&self) -> &'static str {
        "shell_exec"
    }

    fn result_predicate(&self) -> &'static str {
        "shell_exec_result"
    }

    async fn execute(&self, table: &SymbolTable, request: &ActionRequest) -> Result<Vec<Fact>> {
        let cmd = request
            .string_arg(0)
            .ok_or_else(|| DispatchError::Execution {
                stage: "shell_exec".into(),
                reason: "missing command argument".into(),
            })?;

        let mut command = Command::new("bash");
        command.arg("-lc").arg(cmd).current_dir(&self.working_dir);

        let output = timeout(self.default_timeout, command.output())
            .await
            .map_err(|_| DispatchError::Execution {
                stage: "shell_exec".into(),
                reason: format!("timed out after {:?}", self.default_timeout),
            })?
            .map_err(|e| DispatchError::Execution {
                stage: "shell_exec".into(),
                reason: e.to_string(),
            })?;

        Ok(vec![Fact::new(
            table.intern(self.result_predicate()),
            vec![
                Term::Str(cmd.to_string()),
                Term::Int(output.status.code().unwrap_or(-1) as i64),
                Term::Str(String::from_utf8_lossy(&output.stdout).to_string()),
                Term::Str(String::from_utf8_lossy(&output.stderr).to_string()),
            ],
        )])
    }
}
