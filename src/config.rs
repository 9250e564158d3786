//! `git-up.*` settings read from git config.

use crate::{error::Result, hooks::LogHook, vcs::VersionControl};

const PREFIX: &str = "git-up";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpConfig {
    /// Process branches in name order instead of enumeration order.
    pub sort: bool,
    /// Fetch every remote, not only the ones tracked branches use.
    pub fetch_all: bool,
    /// Explicit `fetch.prune` setting; unset means "prune when supported".
    pub fetch_prune: Option<bool>,
    pub log_hook: Option<LogHook>,
    /// Extra arguments for `git rebase`.
    pub rebase_arguments: Vec<String>,
    /// When off, branches that need a rebase are only reported.
    pub rebase_auto: bool,
    pub show_hashes: bool,
    pub bundler_check: bool,
    pub bundler_autoinstall: bool,
}

impl Default for UpConfig {
    fn default() -> Self {
        Self {
            sort: false,
            fetch_all: false,
            fetch_prune: None,
            log_hook: None,
            rebase_arguments: Vec::new(),
            rebase_auto: true,
            show_hashes: false,
            bundler_check: false,
            bundler_autoinstall: false,
        }
    }
}

impl UpConfig {
    pub fn load<V: VersionControl + ?Sized>(vcs: &V) -> Result<Self> {
        let defaults = UpConfig::default();
        let config = UpConfig {
            sort: read_bool(vcs, "sort")?.unwrap_or(defaults.sort),
            fetch_all: read_bool(vcs, "fetch.all")?.unwrap_or(defaults.fetch_all),
            fetch_prune: read_bool(vcs, "fetch.prune")?,
            log_hook: read(vcs, "rebase.log-hook")?
                .filter(|hook| !hook.trim().is_empty())
                .map(LogHook::new),
            rebase_arguments: read(vcs, "rebase.arguments")?
                .map(|arguments| arguments.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            rebase_auto: read_bool(vcs, "rebase.auto")?.unwrap_or(defaults.rebase_auto),
            show_hashes: read_bool(vcs, "rebase.show-hashes")?.unwrap_or(defaults.show_hashes),
            bundler_check: read_bool(vcs, "bundler.check")?.unwrap_or(defaults.bundler_check),
            bundler_autoinstall: read_bool(vcs, "bundler.autoinstall")?
                .unwrap_or(defaults.bundler_autoinstall),
        };
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }
}

fn read<V: VersionControl + ?Sized>(vcs: &V, key: &str) -> Result<Option<String>> {
    Ok(vcs.config(&format!("{PREFIX}.{key}"))?)
}

fn read_bool<V: VersionControl + ?Sized>(vcs: &V, key: &str) -> Result<Option<bool>> {
    let Some(value) = read(vcs, key)? else {
        return Ok(None);
    };
    if vcs.config_is_bare(&format!("{PREFIX}.{key}"))? {
        return Ok(Some(true));
    }
    let parsed = parse_bool(&value);
    if parsed.is_none() {
        tracing::warn!("Ignoring invalid boolean for {}.{}: '{}'", PREFIX, key, value);
    }
    Ok(parsed)
}

/// Parse a boolean the way git spells them. An explicit empty value is false;
/// a key with no value at all is handled by the caller.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}
