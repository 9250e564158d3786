//! Decide what a branch needs, purely from commit-graph ancestry.

use serde::Serialize;

use crate::{
    error::Result,
    vcs::{Branch, RemoteRef, VersionControl},
};

/// How a local branch relates to its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Both point at the same commit.
    UpToDate,
    /// The local branch strictly descends from its upstream.
    AheadOfUpstream,
    /// The upstream strictly descends from the local branch.
    FastForwardable,
    /// Both sides have commits the other lacks.
    Diverged,
}

pub fn classify<V: VersionControl + ?Sized>(
    vcs: &V,
    branch: &Branch,
    upstream: &RemoteRef,
) -> Result<SyncState> {
    if branch.head == upstream.head {
        return Ok(SyncState::UpToDate);
    }
    let base = vcs.merge_base(&branch.head, &upstream.head)?;
    let state = classify_heads(&branch.head, &upstream.head, base.as_deref());
    tracing::debug!(
        branch = %branch.name,
        upstream = %upstream.name,
        ?base,
        ?state,
        "classified branch"
    );
    Ok(state)
}

/// Classify from the two heads and their merge base (`None` when the
/// histories are unrelated).
pub fn classify_heads(head: &str, upstream_head: &str, merge_base: Option<&str>) -> SyncState {
    if head == upstream_head {
        SyncState::UpToDate
    } else if merge_base == Some(upstream_head) {
        SyncState::AheadOfUpstream
    } else if merge_base == Some(head) {
        SyncState::FastForwardable
    } else {
        SyncState::Diverged
    }
}
