//! Map local branches to the remote-tracking refs they follow.

use crate::{
    error::Result,
    vcs::{RemoteRef, VersionControl},
};

const DEFAULT_REMOTE: &str = "origin";

/// Resolve the upstream of `branch` from `branch.<name>.remote` and
/// `branch.<name>.merge`, looking it up among `remote_refs`.
///
/// Returns `None` when the expected tracking ref does not exist.
pub fn resolve<V: VersionControl + ?Sized>(
    vcs: &V,
    branch: &str,
    remote_refs: &[RemoteRef],
) -> Result<Option<RemoteRef>> {
    let remote = vcs
        .config(&format!("branch.{branch}.remote"))?
        .unwrap_or_else(|| DEFAULT_REMOTE.to_string());
    let merge = vcs
        .config(&format!("branch.{branch}.merge"))?
        .unwrap_or_else(|| branch.to_string());
    let merge = merge.strip_prefix("refs/heads/").unwrap_or(&merge);

    let wanted = format!("{remote}/{merge}");
    let found = remote_refs
        .iter()
        .find(|remote_ref| remote_ref.name == wanted)
        .cloned();
    if found.is_none() {
        tracing::debug!("Branch '{}' has no tracking ref '{}'", branch, wanted);
    }
    Ok(found)
}

/// Local branches paired with their upstream, in enumeration order.
///
/// Branches without a resolvable upstream are left out.
#[derive(Debug, Clone, Default)]
pub struct RemoteMapping {
    entries: Vec<(String, RemoteRef)>,
}

impl RemoteMapping {
    pub fn build<V: VersionControl + ?Sized>(vcs: &V) -> Result<Self> {
        let remote_refs = vcs.remote_refs()?;
        let mut entries = Vec::new();
        for branch in vcs.branches()? {
            if let Some(upstream) = resolve(vcs, &branch.name, &remote_refs)? {
                entries.push((branch.name, upstream));
            }
        }
        tracing::debug!("Resolved {} tracking branches", entries.len());
        Ok(Self { entries })
    }

    #[cfg(test)]
    pub fn get(&self, branch: &str) -> Option<&RemoteRef> {
        self.entries
            .iter()
            .find(|(name, _)| name == branch)
            .map(|(_, upstream)| upstream)
    }

    pub fn entries(&self) -> &[(String, RemoteRef)] {
        &self.entries
    }

    /// Distinct remotes in use, in first-seen order.
    pub fn remotes(&self) -> Vec<String> {
        let mut remotes: Vec<String> = Vec::new();
        for (_, upstream) in &self.entries {
            let remote = upstream.remote();
            if !remotes.iter().any(|seen| seen == remote) {
                remotes.push(remote.to_string());
            }
        }
        remotes
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
