use std::{path::Path, process::Command};

use anyhow::{Context, Result, anyhow, bail};

use crate::vcs::CommandOutput;

pub struct GitOutput {
    pub(crate) stdout: String,
}

impl GitOutput {
    pub fn output_or(self, message: impl AsRef<str>) -> Result<String> {
        if self.stdout.is_empty() {
            Err(anyhow!("{}", message.as_ref()))
        } else {
            Ok(self.stdout)
        }
    }
}

impl AsRef<str> for GitOutput {
    fn as_ref(&self) -> &str {
        &self.stdout
    }
}

/// Run git in `dir` and return its stdout without trailing whitespace, failing
/// on a non-zero exit.
pub(crate) fn run_git(dir: &Path, args: &[&str]) -> Result<GitOutput> {
    tracing::debug!("Running `git {}`", args.join(" "));
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("running git {args:?}"))?;

    if !out.status.success() {
        bail!(
            "git {:?} failed with exit status: {}: {}",
            args,
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(GitOutput {
        stdout: String::from_utf8_lossy(&out.stdout).trim_end().to_string(),
    })
}

/// Run git in `dir`, keeping the exit status and combined stdout/stderr.
///
/// Used for commands whose failure is a normal outcome the caller inspects
/// (rebase conflicts, refused checkouts).
pub(crate) fn run_git_combined(dir: &Path, args: &[&str]) -> Result<CommandOutput> {
    tracing::debug!("Running `git {}`", args.join(" "));
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("running git {args:?}"))?;

    let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&out.stderr));
    if !out.status.success() {
        tracing::debug!("git {:?} exited with {}", args, out.status);
    }
    Ok(CommandOutput {
        success: out.status.success(),
        output: output.trim_end().to_string(),
    })
}

/// Parse `git status --porcelain -z` output into the listed paths.
///
/// Untracked (`??`) and ignored (`!!`) entries are dropped. Renames and copies
/// carry their source path as an extra NUL-separated field, which is skipped.
pub(crate) fn parse_porcelain_z(output: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut fields = output.split('\0').filter(|field| !field.is_empty());
    while let Some(entry) = fields.next() {
        let (Some(code), Some(path)) = (entry.get(..2), entry.get(3..)) else {
            continue;
        };
        // Either column can report a rename or copy.
        if code.contains(['R', 'C']) {
            let _ = fields.next();
        }
        if code == "??" || code == "!!" || path.is_empty() {
            continue;
        }
        paths.push(path.to_string());
    }
    paths
}

/// A git version as reported by `git --version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion(pub u32, pub u32, pub u32);

impl GitVersion {
    /// First version whose `git fetch` understands `--prune`.
    pub const PRUNE: GitVersion = GitVersion(1, 6, 6);

    /// Parse strings like `git version 2.39.2` or `git version 2.37.1.windows.1`.
    pub fn parse(version: &str) -> Option<GitVersion> {
        let number = version
            .split_whitespace()
            .find(|word| word.starts_with(|c: char| c.is_ascii_digit()))?;
        let mut parts = number.split('.').map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u32>().ok()
        });
        let major = parts.next().flatten()?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some(GitVersion(major, minor, patch))
    }

    pub fn supports_prune(&self) -> bool {
        *self >= GitVersion::PRUNE
    }
}
