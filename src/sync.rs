//! Rebase every tracking branch onto its upstream.
//!
//! A run goes through these stages:
//! 1. Fetch: update the remote-tracking refs of the remotes in use
//! 2. Resolve: pair each local branch with the ref it tracks
//! 3. Sync: classify each branch and rebase the ones that fell behind
//! 4. Restore: pop stashed edits, then return to the starting branch

use crate::{
    checkout::checkout,
    classify::{SyncState, classify},
    config::UpConfig,
    error::{Result, SyncError},
    git::GitVersion,
    rebase::rebase,
    remotes::RemoteMapping,
    report::{Reporter, SyncOutcome},
    stash::with_stash,
    vcs::{Branch, FetchRequest, Position, RemoteRef, VersionControl},
};

/// State for a single invocation.
pub struct GitUp<'a, V: VersionControl + ?Sized> {
    vcs: &'a V,
    config: &'a UpConfig,
    /// Built on first use and dropped whenever remote refs move.
    remote_map: Option<RemoteMapping>,
    /// Where HEAD was when the run started.
    original: Option<Position>,
}

impl<'a, V: VersionControl + ?Sized> GitUp<'a, V> {
    pub fn new(vcs: &'a V, config: &'a UpConfig) -> Self {
        Self {
            vcs,
            config,
            remote_map: None,
            original: None,
        }
    }

    /// Fetch, then bring every tracking branch up to date.
    pub fn run(&mut self, reporter: &mut dyn Reporter) -> Result<()> {
        self.original = Some(self.vcs.current_position()?);
        self.fetch(reporter)?;

        let vcs = self.vcs;
        let result = with_stash(vcs, reporter, |reporter| self.sync_branches(reporter));
        let restored = self.return_to_original(reporter);
        match (result, restored) {
            (Ok(()), restored) => restored,
            (Err(error), Ok(())) => Err(error),
            (Err(error), Err(restore_error)) => {
                tracing::warn!("Could not return to the original branch: {}", restore_error);
                reporter.notice(&restore_error.to_string());
                Err(error)
            }
        }
    }

    fn remote_map(&mut self) -> Result<&RemoteMapping> {
        let mapping = match self.remote_map.take() {
            Some(mapping) => mapping,
            None => RemoteMapping::build(self.vcs)?,
        };
        Ok(self.remote_map.insert(mapping))
    }

    // ============== Stage 1: Fetch ==============

    fn fetch(&mut self, reporter: &mut dyn Reporter) -> Result<()> {
        let all = self.config.fetch_all;
        let remotes = if all {
            Vec::new()
        } else {
            self.remote_map()?.remotes()
        };
        if !all && remotes.is_empty() {
            tracing::debug!("No tracking branches, nothing to fetch");
            return Ok(());
        }

        let request = FetchRequest {
            remotes,
            all,
            prune: self.prune_enabled(reporter)?,
        };
        reporter.fetching(&request.remotes);
        let result = self.vcs.fetch(&request);
        reporter.fetched(matches!(&result, Ok(output) if output.success));
        let result = result?;
        if !result.success {
            return Err(SyncError::FetchFailed {
                output: result.output,
            });
        }

        // Remote refs moved; resolve again against the fresh ones.
        self.remote_map = None;
        Ok(())
    }

    fn prune_enabled(&self, reporter: &mut dyn Reporter) -> Result<bool> {
        if self.config.fetch_prune == Some(false) {
            return Ok(false);
        }
        let version = self.vcs.version()?;
        let supported = GitVersion::parse(&version).is_some_and(|version| version.supports_prune());
        if !supported && self.config.fetch_prune == Some(true) {
            reporter.notice(&format!(
                "git-up.fetch.prune is set but `{}` cannot prune; git 1.6.6 or newer is required",
                version
            ));
        }
        Ok(supported)
    }

    // ============== Stage 2 & 3: Resolve and sync ==============

    fn sync_branches(&mut self, reporter: &mut dyn Reporter) -> Result<()> {
        let mut branches = self.remote_map()?.entries().to_vec();
        if self.config.sort {
            branches.sort_by(|(a, _), (b, _)| a.cmp(b));
        }
        let width = branches
            .iter()
            .map(|(name, _)| name.chars().count())
            .max()
            .unwrap_or(0)
            + 1;

        for (name, upstream) in &branches {
            self.sync_branch(name, upstream, width, reporter)?;
        }
        Ok(())
    }

    fn sync_branch(
        &self,
        name: &str,
        upstream: &RemoteRef,
        width: usize,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let branch = Branch {
            name: name.to_string(),
            head: self.vcs.branch_head(name)?,
        };
        let outcome = match classify(self.vcs, &branch, upstream)? {
            SyncState::UpToDate => SyncOutcome::UpToDate,
            SyncState::AheadOfUpstream => SyncOutcome::Ahead,
            state if !self.config.rebase_auto => SyncOutcome::Skipped { state },
            state => match self.rebase_branch(&branch, upstream, state, width, reporter) {
                Ok(outcome) => outcome,
                Err(error) => {
                    reporter.outcome(
                        name,
                        width,
                        &SyncOutcome::Failed {
                            reason: error.to_string(),
                        },
                    );
                    return Err(error);
                }
            },
        };
        reporter.outcome(name, width, &outcome);
        Ok(())
    }

    fn rebase_branch(
        &self,
        branch: &Branch,
        upstream: &RemoteRef,
        state: SyncState,
        width: usize,
        reporter: &mut dyn Reporter,
    ) -> Result<SyncOutcome> {
        if let Some(hook) = &self.config.log_hook {
            hook.run(&branch.name, upstream.remote());
        }
        reporter.syncing(&branch.name, width, state);
        checkout(self.vcs, &branch.name)?;
        rebase(
            self.vcs,
            &branch.name,
            upstream,
            &self.config.rebase_arguments,
        )?;

        let from = branch.head.clone();
        let to = self.vcs.branch_head(&branch.name)?;
        Ok(match state {
            SyncState::FastForwardable => SyncOutcome::FastForwarded { from, to },
            _ => SyncOutcome::Rebased { from, to },
        })
    }

    // ============== Stage 4: Restore ==============

    fn return_to_original(&self, reporter: &mut dyn Reporter) -> Result<()> {
        let Some(Position::Branch(original)) = &self.original else {
            return Ok(());
        };
        if self.vcs.current_position()?.branch_name() == Some(original.as_str()) {
            return Ok(());
        }
        reporter.returning_to(original);
        checkout(self.vcs, original)
    }
}
