//! Shard identity, kind, and lifecycle.

use nsk_kernel::Kernel;
use std::fmt;

/// The kinds of sub-agent a factory may be registered for. `UserDefined`
/// carries whatever name the caller registered, so the scheduler never has
/// to be recompiled to support a new shard kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShardKind {
    Coder,
    Tester,
    Reviewer,
    Researcher,
    Nemesis,
    System,
    UserDefined(String),
}

impl ShardKind {
    pub fn as_str(&self) -> &str {
        match self {
            ShardKind::Coder => "coder",
            ShardKind::Tester => "tester",
            ShardKind::Reviewer => "reviewer",
            ShardKind::Researcher => "researcher",
            ShardKind::Nemesis => "nemesis",
            ShardKind::System => "system",
            ShardKind::UserDefined(name) => name,
        }
    }

    /// System shards are never fully torn down; their state is always
    /// rebuilt from the parent kernel's facts on restart instead.
    pub fn is_system(&self) -> bool {
        matches!(self, ShardKind::System)
    }
}

impl fmt::Display for ShardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Initialized,
    Running,
    Suspended,
    Completed,
    Failed,
    Destroyed,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Created => "created",
            Lifecycle::Initialized => "initialized",
            Lifecycle::Running => "running",
            Lifecycle::Suspended => "suspended",
            Lifecycle::Completed => "completed",
            Lifecycle::Failed => "failed",
            Lifecycle::Destroyed => "destroyed",
        }
    }
}

/// Whether a shard survives past a single task. Ephemeral shards are the
/// only kind `destroy` may act on; persistent and system shards are exempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShardLifetime {
    Ephemeral,
    Persistent,
    System,
}

pub struct Shard {
    pub id: String,
    pub kind: ShardKind,
    pub lifetime: ShardLifetime,
    pub lifecycle: Lifecycle,
    pub kernel: Kernel,
    pub allowed_tools: Vec<String>,
}

impl Shard {
    pub fn transition(&mut self, to: Lifecycle) {
        tracing::info!(shard = %self.id, kind = %self.kind, from = self.lifecycle.as_str(), to = to.as_str(), "shard lifecycle transition");
        self.lifecycle = to;
    }
}
