use crate::{
    error::{Result, SyncError},
    vcs::{Position, RemoteRef, VersionControl},
};

/// Rebase the checked-out `branch` onto `target` and verify the result.
///
/// Git's exit status is not trusted on its own: afterwards HEAD must still
/// name a branch and that branch must contain `target.head`. A rebase left
/// stopped on a conflict is aborted so the branch and work tree are back where
/// they started.
pub fn rebase<V: VersionControl + ?Sized>(
    vcs: &V,
    branch: &str,
    target: &RemoteRef,
    arguments: &[String],
) -> Result<()> {
    let result = vcs.rebase(&target.name, arguments)?;
    if let Some(current) = verified_branch(vcs, branch, target)? {
        if !result.success {
            tracing::warn!(
                "git rebase reported failure but '{}' is on top of '{}'",
                current,
                target.name
            );
        }
        return Ok(());
    }

    abort_in_progress(vcs, branch)?;
    Err(SyncError::RebaseFailed {
        branch: branch.to_string(),
        target: target.name.clone(),
        output: result.output,
    })
}

/// The branch HEAD names, if it now contains `target.head`.
fn verified_branch<V: VersionControl + ?Sized>(
    vcs: &V,
    branch: &str,
    target: &RemoteRef,
) -> Result<Option<String>> {
    let Position::Branch(current) = vcs.current_position()? else {
        tracing::debug!("HEAD is detached after rebasing '{}'", branch);
        return Ok(None);
    };
    let head = vcs.branch_head(&current)?;
    let base = vcs.merge_base(&head, &target.head)?;
    if base.as_deref() != Some(target.head.as_str()) {
        tracing::debug!(
            ?base,
            "'{}' at {} does not contain {} after rebase",
            current,
            head,
            target.head
        );
        return Ok(None);
    }
    Ok(Some(current))
}

fn abort_in_progress<V: VersionControl + ?Sized>(vcs: &V, branch: &str) -> Result<()> {
    if !vcs.rebase_in_progress()? {
        return Ok(());
    }
    tracing::debug!("Aborting the stopped rebase of '{}'", branch);
    let aborted = vcs.rebase_abort()?;
    if !aborted.success {
        tracing::warn!("git rebase --abort failed: {}", aborted.output);
    }
    Ok(())
}
