//! `next_action(id, kind, args...)` as a typed request, and the handler trait
//! every concrete effect (filesystem, shell, git, ...) implements.

use async_trait::async_trait;
use nsk_kernel::{Fact, Symbol, SymbolTable, Term};

use crate::error::Result;

/// A `next_action` fact pulled apart into something handlers can match on
/// without re-deriving the predicate shape every time.
#[derive(Clone, Debug)]
pub struct ActionRequest {
    pub id: String,
    pub kind: String,
    pub args: Vec<Term>,
}

impl ActionRequest {
    /// Parse a `next_action(id, kind, args...)` fact. `id` and `kind` are
    /// read positionally per the data model; anything after them is passed
    /// through to the handler untouched.
    pub fn from_fact(fact: &Fact, table: &SymbolTable) -> Option<Self> {
        let id = match fact.args.first()? {
            Term::Str(s) => s.clone(),
            _ => return None,
        };
        let kind = match fact.args.get(1)? {
            Term::Atom(a) => table.resolve(*a).to_string(),
            _ => return None,
        };
        let args = fact.args.get(2..).map(|s| s.to_vec()).unwrap_or_default();
        Some(Self { id, kind, args })
    }

    pub fn string_arg(&self, index: usize) -> Option<&str> {
        match self.args.get(index) {
            Some(Term::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// One concrete effect behind the dispatcher gate. Handlers never see a
/// `next_action` fact until the constitutional gate and the Dreamer have
/// both cleared it; they are trusted to actually perform the effect and
/// report what happened as facts.
#[async_trait]
pub trait EffectHandler: Send + Sync {
    /// The action kind this handler answers for, e.g. `/edit_file`,
    /// `/shell_exec`, `/git_commit`.
    fn kind(&self) -> &'static str;

    /// The predicate results from this action are reported under, e.g.
    /// `shell_exec_result`. Handlers that report no facts (pure side
    /// effects like a file write) can return any name; it goes unused.
    fn result_predicate(&self) -> &'static str;

    async fn execute(&self, table: &SymbolTable, request: &ActionRequest) -> Result<Vec<Fact>>;
}

/// A predicate whose facts are produced on demand rather than stored, per
/// §4.3: `file_content`, `shell_exec_result`, `mcp_tool_result`,
/// `vector_recall`, `lsp_definition`, and friends.
#[async_trait]
pub trait VirtualPredicate: Send + Sync {
    fn predicate(&self) -> &'static str;

    async fn get_facts(&self, table: &SymbolTable, bindings: &[Term]) -> Result<Vec<Fact>>;
}

pub fn action_kind_symbol(table: &SymbolTable, kind: &str) -> Symbol {
    table.intern(kind)
}
