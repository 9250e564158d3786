//! Keep uncommitted edits out of the way while branches are rebased.

use std::collections::HashSet;

use crate::{
    error::{Result, SyncError},
    report::Reporter,
    vcs::VersionControl,
};

/// Count changes that show up in both the structured and the short status.
///
/// Requiring both filters out untracked and ignored noise that only one of
/// the two views reports.
pub fn relevant_change_count<V: VersionControl + ?Sized>(vcs: &V) -> Result<usize> {
    let status = vcs.status()?;
    let short: HashSet<String> = vcs.short_status()?.into_iter().collect();
    Ok(status.paths().filter(|path| short.contains(*path)).count())
}

/// A stash taken for the duration of one run.
pub struct StashGuard<'a, V: VersionControl + ?Sized> {
    vcs: &'a V,
    stashed: bool,
}

impl<'a, V: VersionControl + ?Sized> StashGuard<'a, V> {
    /// Stash relevant changes, if there are any.
    pub fn acquire(vcs: &'a V, reporter: &mut dyn Reporter) -> Result<Self> {
        let count = relevant_change_count(vcs)?;
        if count == 0 {
            return Ok(Self {
                vcs,
                stashed: false,
            });
        }

        reporter.stashing(count);
        let result = vcs.stash_save()?;
        if !result.success {
            return Err(SyncError::StashFailed {
                output: result.output,
            });
        }
        tracing::debug!("Stashed {} changes", count);
        Ok(Self { vcs, stashed: true })
    }

    #[cfg(test)]
    pub fn is_stashed(&self) -> bool {
        self.stashed
    }

    /// Pop the stash back, if one was taken.
    pub fn release(self, reporter: &mut dyn Reporter) -> Result<()> {
        if !self.stashed {
            return Ok(());
        }
        reporter.unstashing();
        let result = self.vcs.stash_pop()?;
        if !result.success {
            return Err(SyncError::StashPopFailed {
                output: result.output,
            });
        }
        Ok(())
    }
}

/// Run `work` with local changes stashed.
///
/// The stash is popped on every exit path. When `work` fails its error wins;
/// a failed pop on that path is only logged.
pub fn with_stash<V, T, F>(vcs: &V, reporter: &mut dyn Reporter, work: F) -> Result<T>
where
    V: VersionControl + ?Sized,
    F: FnOnce(&mut dyn Reporter) -> Result<T>,
{
    let guard = StashGuard::acquire(vcs, reporter)?;
    let result = work(reporter);
    let released = guard.release(reporter);
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(error)) => Err(error),
        (Err(error), Ok(())) => Err(error),
        (Err(error), Err(pop_error)) => {
            tracing::warn!("Could not restore stashed changes: {}", pop_error);
            reporter.notice(&format!(
                "{pop_error}; your changes are still in `git stash list`"
            ));
            Err(error)
        }
    }
}
