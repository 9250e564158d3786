use crate::config::UpConfig;
use crate::git2_ops::GitRepo;
use crate::report::{CliReporter, JsonReporter, Reporter};
use crate::sync::GitUp;

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use tracing_subscriber::EnvFilter;

mod bundler;
mod checkout;
mod classify;
mod config;
mod error;
mod git;
mod git2_ops;
mod hooks;
mod rebase;
mod remotes;
mod report;
mod stash;
mod sync;
#[cfg(test)]
mod testing;
mod vcs;

/// Fetch and rebase all locally-tracked remote branches.
#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    #[arg(long, short, help = "Enable verbose output")]
    verbose: bool,

    #[arg(long, help = "Print a JSON summary instead of progress lines")]
    json: bool,
}

fn main() {
    if let Err(e) = inner_main() {
        report::print_error(&e);
        tracing::debug!(error = ?e);
        std::process::exit(1);
    }
    std::process::exit(0);
}

fn inner_main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cwd = env::current_dir().context("reading the current directory")?;
    let repo = GitRepo::open(&cwd)?;
    tracing::debug!("Repository work tree: {}", repo.workdir().display());

    let config = UpConfig::load(&repo)?;
    let mut reporter: Box<dyn Reporter> = if args.json {
        Box::new(JsonReporter::default())
    } else {
        Box::new(CliReporter::new(config.show_hashes))
    };

    let mut result = GitUp::new(&repo, &config).run(reporter.as_mut());
    if result.is_ok() && config.bundler_check {
        result = bundler::check(repo.workdir(), config.bundler_autoinstall, reporter.as_mut());
    }
    reporter.finish();
    Ok(result?)
}
