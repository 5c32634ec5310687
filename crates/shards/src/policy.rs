//! `ShardKind` → policy-file mapping. Each kind gets a minimal set of hot-
//! loadable rules declaring its `active_strategy` plus the concrete tool
//! names the dispatcher will allow it to invoke. Grounded in the teacher's
//! `codex_delegate::SubAgentSource` distinction (Review/Task/Analysis), widened
//! to the spec's six-kind set.

use crate::shard::ShardKind;

#[derive(Clone, Debug)]
pub struct ShardPolicy {
    /// Rule-text lines, hot-loaded into the child kernel at spawn time.
    pub rules: Vec<String>,
    pub allowed_tools: Vec<String>,
}

/// The built-in default policy for each standard shard kind. `UserDefined`
/// kinds get an empty policy; callers are expected to register their own
/// via a factory rather than relying on a default.
pub fn default_policy_for(kind: &ShardKind) -> ShardPolicy {
    match kind {
        ShardKind::Coder => ShardPolicy {
            rules: vec![
                "active_strategy(/implement) :- task_kind(/code_change).".to_string(),
            ],
            allowed_tools: vec!["edit_file".to_string(), "shell_exec".to_string(), "file_content".to_string()],
        },
        ShardKind::Tester => ShardPolicy {
            rules: vec![
                "active_strategy(/verify) :- task_kind(/code_change).".to_string(),
            ],
            allowed_tools: vec!["shell_exec".to_string(), "file_content".to_string()],
        },
        ShardKind::Reviewer => ShardPolicy {
            rules: vec![
                "active_strategy(/critique) :- task_kind(/code_change).".to_string(),
            ],
            allowed_tools: vec!["file_content".to_string()],
        },
        ShardKind::Researcher => ShardPolicy {
            rules: vec![
                "active_strategy(/gather) :- task_kind(/question).".to_string(),
            ],
            allowed_tools: vec!["file_content".to_string(), "vector_recall".to_string()],
        },
        ShardKind::Nemesis => ShardPolicy {
            rules: vec![
                "active_strategy(/attack) :- task_kind(/candidate_tool).".to_string(),
            ],
            allowed_tools: vec!["shell_exec".to_string()],
        },
        ShardKind::System => ShardPolicy {
            rules: vec![],
            allowed_tools: vec!["edit_file".to_string(), "shell_exec".to_string(), "git_commit".to_string()],
        },
        ShardKind::UserDefined(_) => ShardPolicy {
            rules: vec![],
            allowed_tools: vec![],
        },
    }
}
