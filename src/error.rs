//! Error types for a git-up run.

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Everything that can abort a run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The working directory is not inside a git work tree.
    #[error("not a git repository")]
    NotARepository,

    /// `git fetch` exited non-zero.
    #[error("`git fetch` failed")]
    FetchFailed { output: String },

    /// HEAD did not end up on the requested branch.
    #[error("failed to check out '{branch}'")]
    CheckoutFailed { branch: String, output: String },

    /// The rebase did not leave the branch on top of its target.
    #[error("failed to rebase '{branch}' onto '{target}'")]
    RebaseFailed {
        branch: String,
        target: String,
        output: String,
    },

    /// `git stash` exited non-zero.
    #[error("failed to stash local changes")]
    StashFailed { output: String },

    /// `git stash pop` exited non-zero; the changes are still in the stash.
    #[error("failed to restore stashed changes; run `git stash pop` manually")]
    StashPopFailed { output: String },

    /// `bundle install` exited non-zero.
    #[error("`bundle install` failed")]
    BundlerFailed { output: String },

    #[error(transparent)]
    Git(#[from] anyhow::Error),
}

impl SyncError {
    /// Raw tool output attached to the error, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            SyncError::FetchFailed { output }
            | SyncError::CheckoutFailed { output, .. }
            | SyncError::RebaseFailed { output, .. }
            | SyncError::StashFailed { output }
            | SyncError::StashPopFailed { output }
            | SyncError::BundlerFailed { output } => {
                Some(output.as_str()).filter(|output| !output.trim().is_empty())
            }
            SyncError::NotARepository | SyncError::Git(_) => None,
        }
    }
}
