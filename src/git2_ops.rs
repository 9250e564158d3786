//! git2-backed implementation of [`VersionControl`].
//!
//! Read-only queries (refs, config, ancestry, status) go through git2 to avoid
//! spawning processes. Anything that mutates the work tree shells out to the
//! `git` binary so hooks, rebase state and user configuration behave exactly
//! as they do on the command line.

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use git2::{BranchType, ErrorCode, Oid, Repository, RepositoryState, Status, StatusOptions};

use crate::{
    error::SyncError,
    git::{parse_porcelain_z, run_git, run_git_combined},
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

pub struct GitRepo {
    repo: Repository,
    workdir: PathBuf,
}

impl GitRepo {
    /// Open the repository containing `path`.
    pub fn open(path: &Path) -> std::result::Result<Self, SyncError> {
        let repo = match Repository::discover(path) {
            Ok(repo) => repo,
            Err(error) if error.code() == ErrorCode::NotFound => {
                return Err(SyncError::NotARepository);
            }
            Err(error) => {
                return Err(anyhow::Error::new(error)
                    .context(format!("opening repository at {}", path.display()))
                    .into());
            }
        };
        let workdir = repo
            .workdir()
            .ok_or(SyncError::NotARepository)?
            .to_path_buf();
        tracing::debug!("Opened repository at {}", workdir.display());
        Ok(Self { repo, workdir })
    }

    /// Root of the work tree.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn resolve_commit(&self, rev: &str) -> Result<Oid> {
        let commit = self
            .repo
            .revparse_single(rev)
            .with_context(|| format!("Failed to resolve ref: {}", rev))?
            .peel_to_commit()
            .with_context(|| format!("Failed to peel to commit: {}", rev))?;
        Ok(commit.id())
    }

    fn list_branches(&self, branch_type: BranchType) -> Result<Vec<(String, String)>> {
        let mut branches = Vec::new();
        for entry in self.repo.branches(Some(branch_type))? {
            let (branch, _) = entry?;
            let reference = branch.get();
            if reference.symbolic_target().is_some() {
                continue;
            }
            let Some(name) = branch.name()? else {
                tracing::warn!("Skipping branch with a non UTF-8 name");
                continue;
            };
            let head = reference
                .peel_to_commit()
                .with_context(|| format!("Failed to peel branch {} to a commit", name))?
                .id()
                .to_string();
            branches.push((name.to_string(), head));
        }
        Ok(branches)
    }
}

impl VersionControl for GitRepo {
    fn branches(&self) -> Result<Vec<Branch>> {
        Ok(self
            .list_branches(BranchType::Local)?
            .into_iter()
            .map(|(name, head)| Branch { name, head })
            .collect())
    }

    fn remote_refs(&self) -> Result<Vec<RemoteRef>> {
        Ok(self
            .list_branches(BranchType::Remote)?
            .into_iter()
            .filter(|(name, _)| !name.ends_with("/HEAD"))
            .map(|(name, head)| RemoteRef { name, head })
            .collect())
    }

    fn branch_head(&self, name: &str) -> Result<String> {
        let branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .with_context(|| format!("Failed to find branch: {}", name))?;
        Ok(branch.get().peel_to_commit()?.id().to_string())
    }

    fn config(&self, key: &str) -> Result<Option<String>> {
        let snapshot = self.repo.config()?.snapshot()?;
        match snapshot.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.code() == ErrorCode::NotFound => Ok(None),
            Err(error) => Err(anyhow::Error::new(error).context(format!("reading config {key}"))),
        }
    }

    fn config_is_bare(&self, key: &str) -> Result<bool> {
        let snapshot = self.repo.config()?.snapshot()?;
        match snapshot.get_entry(key) {
            Ok(entry) => Ok(!entry.has_value()),
            Err(error) if error.code() == ErrorCode::NotFound => Ok(false),
            Err(error) => Err(anyhow::Error::new(error).context(format!("reading config {key}"))),
        }
    }

    fn fetch(&self, request: &FetchRequest) -> Result<CommandOutput> {
        let mut args = vec!["fetch"];
        if request.all {
            args.push("--all");
        } else {
            args.push("--multiple");
        }
        if request.prune {
            args.push("--prune");
        }
        if !request.all {
            args.extend(request.remotes.iter().map(String::as_str));
        }
        run_git_combined(&self.workdir, &args)
    }

    fn status(&self) -> Result<StatusSummary> {
        let start = Instant::now();
        let mut options = StatusOptions::new();
        options
            .include_untracked(false)
            .include_ignored(false)
            .exclude_submodules(true);
        let statuses = self.repo.statuses(Some(&mut options))?;

        let mut summary = StatusSummary::default();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                continue;
            };
            let status = entry.status();
            if status.intersects(Status::INDEX_DELETED | Status::WT_DELETED) {
                summary.deleted.push(path.to_string());
            } else if status.intersects(Status::INDEX_NEW) {
                summary.added.push(path.to_string());
            } else if status.intersects(
                Status::INDEX_MODIFIED
                    | Status::WT_MODIFIED
                    | Status::INDEX_RENAMED
                    | Status::WT_RENAMED
                    | Status::INDEX_TYPECHANGE
                    | Status::WT_TYPECHANGE,
            ) {
                summary.changed.push(path.to_string());
            }
        }
        tracing::debug!(elapsed = ?start.elapsed(), "git2 status");
        Ok(summary)
    }

    fn short_status(&self) -> Result<Vec<String>> {
        let output = run_git(
            &self.workdir,
            &["status", "--porcelain", "-z", "--untracked-files=no"],
        )?;
        Ok(parse_porcelain_z(output.as_ref()))
    }

    fn stash_save(&self) -> Result<CommandOutput> {
        run_git_combined(&self.workdir, &["stash"])
    }

    fn stash_pop(&self) -> Result<CommandOutput> {
        run_git_combined(&self.workdir, &["stash", "pop"])
    }

    fn checkout(&self, name: &str) -> Result<CommandOutput> {
        run_git_combined(&self.workdir, &["checkout", name])
    }

    fn rebase(&self, target: &str, arguments: &[String]) -> Result<CommandOutput> {
        let mut args = vec!["rebase"];
        args.extend(arguments.iter().map(String::as_str));
        args.push(target);
        run_git_combined(&self.workdir, &args)
    }

    fn rebase_in_progress(&self) -> Result<bool> {
        Ok(matches!(
            self.repo.state(),
            RepositoryState::Rebase
                | RepositoryState::RebaseInteractive
                | RepositoryState::RebaseMerge
                | RepositoryState::ApplyMailboxOrRebase
        ))
    }

    fn rebase_abort(&self) -> Result<CommandOutput> {
        run_git_combined(&self.workdir, &["rebase", "--abort"])
    }

    fn merge_base(&self, one: &str, two: &str) -> Result<Option<String>> {
        let one = self.resolve_commit(one)?;
        let two = self.resolve_commit(two)?;
        match self.repo.merge_base(one, two) {
            Ok(base) => Ok(Some(base.to_string())),
            Err(error) if error.code() == ErrorCode::NotFound => Ok(None),
            Err(error) => Err(anyhow::Error::new(error).context("computing merge base")),
        }
    }

    fn current_position(&self) -> Result<Position> {
        // Read HEAD as a reference rather than through `head()` so an unborn
        // branch still reports its name.
        let head = self
            .repo
            .find_reference("HEAD")
            .context("Failed to read HEAD")?;
        Ok(match head.symbolic_target() {
            Some(target) => match target.strip_prefix("refs/heads/") {
                Some(name) => Position::Branch(name.to_string()),
                None => Position::Detached,
            },
            None => Position::Detached,
        })
    }

    fn version(&self) -> Result<String> {
        run_git(&self.workdir, &["--version"])?.output_or("git printed no version")
    }
}
