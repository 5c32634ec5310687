//! Git operations capability: `/git_commit`, `/git_branch`, layered on top
//! of the same subprocess path as `ShellExecHandler` rather than a bespoke
//! libgit2 binding, matching the teacher's preference for shelling out to
//! the `git` binary over vendoring a git implementation.

use async_trait::async_trait;
use nsk_kernel::{Fact, SymbolTable, Term};
use tokio::process::Command;

use crate::action::{ActionRequest, EffectHandler};
use crate::error::{DispatchError, Result};

pub struct GitCommitHandler {
    working_dir: std::path::PathBuf,
}

impl GitCommitHandler {
    pub fn new(working_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl EffectHandler for GitCommitHandler {
    fn kind(&self) -> &'static str {
        "git_commit"
    }

    fn result_predicate(&self) -> &'static str {
        "git_commit_result"
    }

    async fn execute(&self, table: &SymbolTable, request: &ActionRequest) -> Result<Vec<Fact>> {
        let message = request
            .string_arg(0)
            .ok_or_else(|| DispatchError::Execution {
                stage: "git_commit".into(),
                reason: "missing commit message argument".into(),
            })?;

        let output = Command::new("git")
            .args(["commit", "-m", message])
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| DispatchError::Execution {
                stage: "git_commit".into(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DispatchError::Execution {
                stage: "git_commit".into(),
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        Ok(vec![Fact::new(
            table.intern(self.result_predicate()),
            vec![Term::Str(message.to_string())],
        )])
    }
}
