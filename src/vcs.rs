//! The narrow version-control surface the sync engine is written against.
//!
//! Everything that shells out to git or parses its output lives behind
//! [`VersionControl`]; the sync core only ever sees these typed values.

use anyhow::Result;

/// A local branch and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub head: String,
}

/// A remote-tracking ref such as `origin/main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub name: String,
    pub head: String,
}

impl RemoteRef {
    /// The remote part of the name (`origin` for `origin/feature/x`).
    pub fn remote(&self) -> &str {
        self.name
            .split_once('/')
            .map(|(remote, _)| remote)
            .unwrap_or(&self.name)
    }
}

/// Where HEAD currently points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    Branch(String),
    Detached,
}

impl Position {
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            Position::Branch(name) => Some(name),
            Position::Detached => None,
        }
    }
}

/// Paths with uncommitted changes, as reported by the structured status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
}

impl StatusSummary {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.added
            .iter()
            .chain(&self.changed)
            .chain(&self.deleted)
            .map(String::as_str)
    }
}

/// Exit status plus combined stdout/stderr of a mutating git command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub output: String,
}

/// What to fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Remotes to fetch; ignored when `all` is set.
    pub remotes: Vec<String>,
    pub all: bool,
    pub prune: bool,
}

pub trait VersionControl {
    /// Local branches in the repository's enumeration order.
    fn branches(&self) -> Result<Vec<Branch>>;
    /// Remote-tracking refs, excluding symbolic `<remote>/HEAD` refs.
    fn remote_refs(&self) -> Result<Vec<RemoteRef>>;
    /// Current head commit of a local branch.
    fn branch_head(&self, name: &str) -> Result<String>;
    /// Value of a config key, `None` when unset.
    fn config(&self, key: &str) -> Result<Option<String>>;
    /// Whether `key` is present with no value at all (`[section] key`), which
    /// git reads as boolean true. Such keys report `Some("")` from `config`.
    fn config_is_bare(&self, key: &str) -> Result<bool>;
    fn fetch(&self, request: &FetchRequest) -> Result<CommandOutput>;
    fn status(&self) -> Result<StatusSummary>;
    /// Paths listed by the short porcelain status, untracked files excluded.
    fn short_status(&self) -> Result<Vec<String>>;
    fn stash_save(&self) -> Result<CommandOutput>;
    fn stash_pop(&self) -> Result<CommandOutput>;
    fn checkout(&self, name: &str) -> Result<CommandOutput>;
    /// Rebase the current branch onto `target`.
    fn rebase(&self, target: &str, arguments: &[String]) -> Result<CommandOutput>;
    /// Whether a rebase is stopped part-way, waiting to be continued or aborted.
    fn rebase_in_progress(&self) -> Result<bool>;
    fn rebase_abort(&self) -> Result<CommandOutput>;
    /// Best common ancestor of two commits, `None` for unrelated histories.
    fn merge_base(&self, one: &str, two: &str) -> Result<Option<String>>;
    fn current_position(&self) -> Result<Position>;
    /// The `git --version` string.
    fn version(&self) -> Result<String>;
}
