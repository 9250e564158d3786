//! Test doubles: an in-memory [`VersionControl`], a recording [`Reporter`] and
//! helpers for throwaway repositories driven by the real `git` binary.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::{
    classify::SyncState,
    report::{Reporter, SyncOutcome},
    vcs::{
        Branch,
        CommandOutput,
        FetchRequest,
        Position,
        RemoteRef,
        StatusSummary,
        VersionControl,
    },
};

// ============== In-memory repository ==============

#[derive(Default)]
struct FakeState {
    parents: HashMap<String, Vec<String>>,
    branches: Vec<Branch>,
    remote_refs: Vec<RemoteRef>,
    config: HashMap<String, String>,
    bare_config: HashSet<String>,
    current: Option<String>,
    status: StatusSummary,
    short_status: Vec<String>,
    stashes: Vec<(StatusSummary, Vec<String>)>,
    fetch_moves: Vec<(String, String)>,
    fail_fetch: bool,
    fail_stash_pop: bool,
    failing_checkouts: HashSet<String>,
    failing_rebases: HashSet<String>,
    unverified_rebases: HashSet<String>,
    /// Branch whose rebase stopped on a conflict and was not aborted yet.
    stopped_rebase: Option<String>,
    version: Option<String>,
    rebased_commits: usize,
    merge_base_queries: usize,
    calls: Vec<String>,
}

/// A commit graph with branches and refs, mutated the way git would.
#[derive(Default)]
pub struct FakeVcs {
    state: RefCell<FakeState>,
}

fn ok(output: impl Into<String>) -> Result<CommandOutput> {
    Ok(CommandOutput {
        success: true,
        output: output.into(),
    })
}

fn failed(output: impl Into<String>) -> Result<CommandOutput> {
    Ok(CommandOutput {
        success: false,
        output: output.into(),
    })
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, change: impl FnOnce(&mut FakeState)) -> Self {
        change(&mut self.state.borrow_mut());
        self
    }

    pub fn commit(self, id: &str, parents: &[&str]) -> Self {
        self.with(|state| {
            state.parents.insert(
                id.to_string(),
                parents.iter().map(|parent| parent.to_string()).collect(),
            );
        })
    }

    /// Create or move a local branch.
    pub fn branch(self, name: &str, head: &str) -> Self {
        self.with(|state| {
            match state.branches.iter_mut().find(|branch| branch.name == name) {
                Some(branch) => branch.head = head.to_string(),
                None => state.branches.push(Branch {
                    name: name.to_string(),
                    head: head.to_string(),
                }),
            }
        })
    }

    pub fn remote_ref(self, name: &str, head: &str) -> Self {
        self.with(|state| {
            state.remote_refs.push(RemoteRef {
                name: name.to_string(),
                head: head.to_string(),
            })
        })
    }

    pub fn with_config(self, key: &str, value: &str) -> Self {
        self.with(|state| {
            state.config.insert(key.to_string(), value.to_string());
        })
    }

    /// A key written without a value, as in `[git-up] sort`.
    pub fn with_bare_config(self, key: &str) -> Self {
        self.with(|state| {
            state.config.insert(key.to_string(), String::new());
            state.bare_config.insert(key.to_string());
        })
    }

    /// Point `branch` at `<remote>/<merge>` through its branch config.
    pub fn track(self, branch: &str, remote: &str, merge: &str) -> Self {
        self.with_config(&format!("branch.{branch}.remote"), remote)
            .with_config(&format!("branch.{branch}.merge"), merge)
    }

    pub fn on_branch(self, name: &str) -> Self {
        self.with(|state| state.current = Some(name.to_string()))
    }

    pub fn detached(self) -> Self {
        self.with(|state| state.current = None)
    }

    /// Modified tracked files, visible to both status views.
    pub fn dirty(self, paths: &[&str]) -> Self {
        self.with(|state| {
            for path in paths {
                state.status.changed.push(path.to_string());
                state.short_status.push(path.to_string());
            }
        })
    }

    pub fn status_only(self, path: &str) -> Self {
        self.with(|state| state.status.changed.push(path.to_string()))
    }

    pub fn short_status_only(self, path: &str) -> Self {
        self.with(|state| state.short_status.push(path.to_string()))
    }

    /// Move a remote-tracking ref when the next fetch happens.
    pub fn on_fetch_move(self, name: &str, head: &str) -> Self {
        self.with(|state| state.fetch_moves.push((name.to_string(), head.to_string())))
    }

    pub fn fail_fetch(self) -> Self {
        self.with(|state| state.fail_fetch = true)
    }

    pub fn fail_stash_pop(self) -> Self {
        self.with(|state| state.fail_stash_pop = true)
    }

    pub fn fail_checkout(self, name: &str) -> Self {
        self.with(|state| {
            state.failing_checkouts.insert(name.to_string());
        })
    }

    /// Rebasing `branch` stops on a conflict.
    pub fn fail_rebase(self, branch: &str) -> Self {
        self.with(|state| {
            state.failing_rebases.insert(branch.to_string());
        })
    }

    /// Rebasing `branch` exits zero without moving it.
    pub fn claim_rebase_success(self, branch: &str) -> Self {
        self.with(|state| {
            state.unverified_rebases.insert(branch.to_string());
        })
    }

    pub fn git_version(self, version: &str) -> Self {
        self.with(|state| state.version = Some(version.to_string()))
    }

    /// Mutating commands in the order they ran.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn merge_base_queries(&self) -> usize {
        self.state.borrow().merge_base_queries
    }

    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        ancestors(&self.state.borrow(), descendant).contains(ancestor)
    }
}

/// `id` and everything reachable from it.
fn ancestors(state: &FakeState, id: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([id.to_string()]);
    while let Some(next) = queue.pop_front() {
        if !seen.insert(next.clone()) {
            continue;
        }
        if let Some(parents) = state.parents.get(&next) {
            queue.extend(parents.iter().cloned());
        }
    }
    seen
}

impl VersionControl for FakeVcs {
    fn branches(&self) -> Result<Vec<Branch>> {
        Ok(self.state.borrow().branches.clone())
    }

    fn remote_refs(&self) -> Result<Vec<RemoteRef>> {
        Ok(self.state.borrow().remote_refs.clone())
    }

    fn branch_head(&self, name: &str) -> Result<String> {
        self.state
            .borrow()
            .branches
            .iter()
            .find(|branch| branch.name == name)
            .map(|branch| branch.head.clone())
            .ok_or_else(|| anyhow!("no branch named {name}"))
    }

    fn config(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.borrow().config.get(key).cloned())
    }

    fn config_is_bare(&self, key: &str) -> Result<bool> {
        Ok(self.state.borrow().bare_config.contains(key))
    }

    fn fetch(&self, request: &FetchRequest) -> Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        let mut call = vec!["fetch".to_string()];
        if request.all {
            call.push("--all".to_string());
        } else {
            call.extend(request.remotes.iter().cloned());
        }
        if request.prune {
            call.push("--prune".to_string());
        }
        state.calls.push(call.join(" "));

        if state.fail_fetch {
            return failed("fatal: Could not read from remote repository.");
        }
        for (name, head) in std::mem::take(&mut state.fetch_moves) {
            if let Some(remote_ref) = state.remote_refs.iter_mut().find(|r| r.name == name) {
                remote_ref.head = head;
            }
        }
        ok("")
    }

    fn status(&self) -> Result<StatusSummary> {
        Ok(self.state.borrow().status.clone())
    }

    fn short_status(&self) -> Result<Vec<String>> {
        Ok(self.state.borrow().short_status.clone())
    }

    fn stash_save(&self) -> Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        state.calls.push("stash".to_string());
        let status = std::mem::take(&mut state.status);
        let short = std::mem::take(&mut state.short_status);
        state.stashes.push((status, short));
        ok("Saved working directory and index state")
    }

    fn stash_pop(&self) -> Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        state.calls.push("stash pop".to_string());
        if state.stopped_rebase.is_some() {
            return failed("error: could not write index\nThe stash entry is kept in case you need it again.");
        }
        if state.fail_stash_pop {
            return failed("error: could not restore untracked files from stash");
        }
        match state.stashes.pop() {
            Some((status, short)) => {
                state.status = status;
                state.short_status = short;
                ok("Dropped refs/stash@{0}")
            }
            None => failed("No stash entries found."),
        }
    }

    fn checkout(&self, name: &str) -> Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("checkout {name}"));
        if state.stopped_rebase.is_some() {
            return failed("error: you need to resolve your current index first");
        }
        if state.failing_checkouts.contains(name) {
            return failed(
                "error: Your local changes to the following files would be overwritten by checkout",
            );
        }
        if state.branches.iter().any(|branch| branch.name == name) {
            state.current = Some(name.to_string());
            ok(format!("Switched to branch '{name}'"))
        } else if state.parents.contains_key(name) {
            state.current = None;
            ok(format!("HEAD is now at {name}"))
        } else {
            failed(format!(
                "error: pathspec '{name}' did not match any file(s) known to git"
            ))
        }
    }

    fn rebase(&self, target: &str, arguments: &[String]) -> Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        let mut call = vec!["rebase".to_string()];
        call.extend(arguments.iter().cloned());
        call.push(target.to_string());
        state.calls.push(call.join(" "));

        let current = state
            .current
            .clone()
            .ok_or_else(|| anyhow!("rebase with a detached HEAD"))?;
        if state.failing_rebases.contains(&current) {
            state.current = None;
            state.stopped_rebase = Some(current);
            return failed("CONFLICT (content): Merge conflict in file.txt\nerror: could not apply");
        }
        if state.unverified_rebases.contains(&current) {
            return ok("Successfully rebased and updated.");
        }

        let target_head = state
            .remote_refs
            .iter()
            .find(|remote_ref| remote_ref.name == target)
            .map(|remote_ref| remote_ref.head.clone())
            .ok_or_else(|| anyhow!("unknown rebase target {target}"))?;
        let head = state
            .branches
            .iter()
            .find(|branch| branch.name == current)
            .map(|branch| branch.head.clone())
            .ok_or_else(|| anyhow!("no branch named {current}"))?;

        let new_head = if ancestors(&state, &target_head).contains(&head) {
            target_head
        } else {
            state.rebased_commits += 1;
            let id = format!("{current}'{}", state.rebased_commits);
            state.parents.insert(id.clone(), vec![target_head]);
            id
        };
        if let Some(branch) = state.branches.iter_mut().find(|branch| branch.name == current) {
            branch.head = new_head;
        }
        ok("Successfully rebased and updated.")
    }

    fn rebase_in_progress(&self) -> Result<bool> {
        Ok(self.state.borrow().stopped_rebase.is_some())
    }

    fn rebase_abort(&self) -> Result<CommandOutput> {
        let mut state = self.state.borrow_mut();
        state.calls.push("rebase --abort".to_string());
        match state.stopped_rebase.take() {
            Some(branch) => {
                state.current = Some(branch);
                ok("")
            }
            None => failed("fatal: No rebase in progress?"),
        }
    }

    fn merge_base(&self, one: &str, two: &str) -> Result<Option<String>> {
        let mut state = self.state.borrow_mut();
        state.merge_base_queries += 1;
        let left = ancestors(&state, one);
        let right = ancestors(&state, two);
        let common: HashSet<&String> = left.intersection(&right).collect();
        // The best common ancestor is the one no other common ancestor descends from.
        let mut best: Vec<&String> = common
            .iter()
            .copied()
            .filter(|candidate| {
                !common.iter().any(|other| {
                    other != candidate && ancestors(&state, other).contains(*candidate)
                })
            })
            .collect();
        best.sort();
        Ok(best.first().map(|id| id.to_string()))
    }

    fn current_position(&self) -> Result<Position> {
        Ok(match &self.state.borrow().current {
            Some(name) => Position::Branch(name.clone()),
            None => Position::Detached,
        })
    }

    fn version(&self) -> Result<String> {
        Ok(self
            .state
            .borrow()
            .version
            .clone()
            .unwrap_or_else(|| "git version 2.43.0".to_string()))
    }
}

// ============== Recording reporter ==============

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<String>,
    pub outcomes: Vec<(String, SyncOutcome)>,
    pub widths: Vec<usize>,
}

impl RecordingReporter {
    pub fn outcome_of(&self, branch: &str) -> Option<&SyncOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == branch)
            .map(|(_, outcome)| outcome)
    }

    pub fn branch_order(&self) -> Vec<&str> {
        self.outcomes.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl Reporter for RecordingReporter {
    fn fetching(&mut self, remotes: &[String]) {
        if remotes.is_empty() {
            self.events.push("fetching all".to_string());
        } else {
            self.events.push(format!("fetching {}", remotes.join(" ")));
        }
    }

    fn fetched(&mut self, success: bool) {
        self.events.push(format!("fetched {success}"));
    }

    fn stashing(&mut self, count: usize) {
        self.events.push(format!("stashing {count}"));
    }

    fn unstashing(&mut self) {
        self.events.push("unstashing".to_string());
    }

    fn syncing(&mut self, branch: &str, _width: usize, state: SyncState) {
        self.events.push(format!("syncing {branch} {state:?}"));
    }

    fn outcome(&mut self, branch: &str, width: usize, outcome: &SyncOutcome) {
        self.widths.push(width);
        self.outcomes.push((branch.to_string(), outcome.clone()));
    }

    fn returning_to(&mut self, branch: &str) {
        self.events.push(format!("returning to {branch}"));
    }

    fn notice(&mut self, message: &str) {
        self.events.push(format!("notice {message}"));
    }
}

// ============== Real repositories ==============

/// Run git in `dir`, panicking on failure, and return trimmed stdout.
pub fn git_in(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn configure(dir: &Path) {
    git_in(dir, &["config", "user.name", "Test"]);
    git_in(dir, &["config", "user.email", "test@example.com"]);
    git_in(dir, &["config", "commit.gpgsign", "false"]);
}

/// Write `contents` to `name` and commit it.
pub fn commit_file(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
    git_in(dir, &["add", name]);
    git_in(dir, &["commit", "-q", "-m", &format!("update {name}")]);
}

/// An `upstream` repository on `main` and a `local` clone of it.
pub struct TestRepo {
    _dir: TempDir,
    pub upstream: PathBuf,
    pub local: PathBuf,
}

impl TestRepo {
    pub fn cloned() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let upstream = dir.path().join("upstream");
        fs::create_dir(&upstream).unwrap();
        git_in(&upstream, &["init", "-q"]);
        git_in(&upstream, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        configure(&upstream);
        commit_file(&upstream, "README.md", "hello");

        git_in(dir.path(), &["clone", "-q", "upstream", "local"]);
        let local = dir.path().join("local");
        configure(&local);

        Self {
            _dir: dir,
            upstream,
            local,
        }
    }

    pub fn git(&self, args: &[&str]) -> String {
        git_in(&self.local, args)
    }

    pub fn upstream_git(&self, args: &[&str]) -> String {
        git_in(&self.upstream, args)
    }
}
