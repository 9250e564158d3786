use std::process::Command;

/// Name passed to hooks as `$0`.
const TOOL_NAME: &str = "git-up";

const SHELL: &str = "sh";

/// A user command run before each branch is rebased.
///
/// Invoked as `sh -c <command> git-up <branch> <remote>`, so the command sees
/// the branch as `$1` and the remote as `$2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogHook {
    command: String,
}

impl LogHook {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Run the hook. Failures are logged and never stop the sync.
    pub fn run(&self, branch: &str, remote: &str) {
        self.run_with(SHELL, branch, remote)
    }

    fn run_with(&self, shell: &str, branch: &str, remote: &str) {
        tracing::debug!("Running log hook for {} ({})", branch, remote);
        match Command::new(shell)
            .args(["-c", &self.command, TOOL_NAME, branch, remote])
            .status()
        {
            Ok(status) if !status.success() => {
                tracing::warn!("Log hook `{}` exited with {}", self.command, status);
            }
            Ok(_) => {}
            Err(error) => {
                tracing::warn!("Could not run log hook `{}`: {}", self.command, error);
            }
        }
    }
}
