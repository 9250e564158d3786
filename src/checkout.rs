use crate::{
    error::{Result, SyncError},
    vcs::{Position, VersionControl},
};

/// Check out `name` and confirm HEAD now names that branch.
pub fn checkout<V: VersionControl + ?Sized>(vcs: &V, name: &str) -> Result<()> {
    let result = vcs.checkout(name)?;
    let position = vcs.current_position()?;
    if position != Position::Branch(name.to_string()) {
        tracing::debug!(?position, "checkout of '{}' did not take effect", name);
        return Err(SyncError::CheckoutFailed {
            branch: name.to_string(),
            output: result.output,
        });
    }
    Ok(())
}
