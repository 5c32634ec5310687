//! Filesystem read/write capability: the `/edit_file`, `/write_file`,
//! `/delete_file` action kinds and the `file_content` virtual predicate.
//!
//! Grounded in the teacher's `apply-patch` crate for the idea of
//! content-addressed, whole-file mutation rather than line-oriented
//! patching — this handler writes complete file contents rather than
//! diff-applying, leaving diff application to `nsk-apply-patch` as a
//! separate virtual-predicate backend callers may register instead.

use async_trait::async_trait;
use nsk_kernel::{Fact, SymbolTable, Term};
use std::path::Path;

use crate::action::{ActionRequest, EffectHandler, VirtualPredicate};
use crate::error::{DispatchError, Result};

pub struct FileWriteHandler {
    root: std::path::PathBuf,
}

impl FileWriteHandler {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> std::path::PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl EffectHandler for FileWriteHandler {
    fn kind(&self) -> &'static str {
        "edit_file"
    }

    fn result_predicate(&self) -> &'static str {
        "modified"
    }

    async fn execute(&self, table: &SymbolTable, request: &ActionRequest) -> Result<Vec<Fact>> {
        let path = request
            .string_arg(0)
            .ok_or_else(|| DispatchError::Execution {
                stage: "edit_file".into(),
                reason: "missing path argument".into(),
            })?;
        let content = request
            .string_arg(1)
            .ok_or_else(|| DispatchError::Execution {
                stage: "edit_file".into(),
                reason: "missing content argument".into(),
            })?;
        let target = self.resolve(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DispatchError::Execution {
                    stage: "edit_file".into(),
                    reason: e.to_string(),
                })?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| DispatchError::Execution {
                stage: "edit_file".into(),
                reason: e.to_string(),
            })?;
        Ok(vec![Fact::new(
            table.intern(self.result_predicate()),
            vec![Term::Str(path.to_string())],
        )])
    }
}

/// `file_content(path, content)`: read-only virtual predicate the engine
/// resolves lazily, only when a rule body actually asks for it.
pub struct FileContentPredicate {
    root: std::path::PathBuf,
}

impl FileContentPredicate {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl VirtualPredicate for FileContentPredicate {
    fn predicate(&self) -> &'static str {
        "file_content"
    }

    async fn get_facts(&self, table: &SymbolTable, bindings: &[Term]) -> Result<Vec<Fact>> {
        let Some(Term::Str(path)) = bindings.first() else {
            return Ok(Vec::new());
        };
        let target = self.root.join(Path::new(path));
        let content = match tokio::fs::read_to_string(&target).await {
            Ok(c) => c,
            Err(_) => return Ok(Vec::new()),
        };
        Ok(vec![Fact::new(
            table.intern(self.predicate()),
            vec![Term::Str(path.clone()), Term::Str(content)],
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsk_kernel::SymbolTable;

    #[tokio::test]
    async fn writes_file_content_to_workspace_root() {
        let dir = tempfile::tempdir().unwrap();
        let table = SymbolTable::new();
        let handler = FileWriteHandler::new(dir.path());
        let request = ActionRequest {
            id: "a".into(),
            kind: "edit_file".into(),
            args: vec![Term::Str("src/lib.rs".into()), Term::Str("fn main() {}".into())],
        };
        handler.execute(&table, &request).await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap();
        assert_eq!(written, "fn main() {}");
    }

    #[tokio::test]
    async fn missing_path_argument_is_an_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let table = SymbolTable::new();
        let handler = FileWriteHandler::new(dir.path());
        let request = ActionRequest {
            id: "a".into(),
            kind: "edit_file".into(),
            args: vec![],
        };
        assert!(handler.execute(&table, &request).await.is_err());
    }
}
