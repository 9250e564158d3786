//! Reporting of per-branch outcomes.
//!
//! The sync engine emits events to a [`Reporter`]; how they are shown is up to
//! the implementation (colored terminal lines or a JSON document).

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::{classify::SyncState, error::SyncError};

/// What happened to a single branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncOutcome {
    UpToDate,
    Ahead,
    FastForwarded { from: String, to: String },
    Rebased { from: String, to: String },
    /// Needed a rebase but automatic rebasing is turned off.
    Skipped { state: SyncState },
    Failed { reason: String },
}

pub trait Reporter {
    /// A fetch of `remotes` is starting (empty means all remotes).
    fn fetching(&mut self, remotes: &[String]);
    fn fetched(&mut self, success: bool);
    fn stashing(&mut self, count: usize);
    fn unstashing(&mut self);
    /// A branch is about to be checked out and rebased.
    fn syncing(&mut self, branch: &str, width: usize, state: SyncState);
    fn outcome(&mut self, branch: &str, width: usize, outcome: &SyncOutcome);
    fn returning_to(&mut self, branch: &str);
    /// Something the user should know that does not stop the run.
    fn notice(&mut self, message: &str);
    fn finish(&mut self) {}
}

fn fetch_label(remotes: &[String]) -> String {
    if remotes.is_empty() {
        "all remotes".to_string()
    } else {
        remotes.join(" ")
    }
}

fn short_id(id: &str) -> &str {
    id.get(..7).unwrap_or(id)
}

// ============== Terminal ==============

pub struct CliReporter {
    show_hashes: bool,
    spinner: Option<(ProgressBar, String)>,
}

impl CliReporter {
    pub fn new(show_hashes: bool) -> Self {
        Self {
            show_hashes,
            spinner: None,
        }
    }

    fn print_hashes(&self, width: usize, from: &str, to: &str) {
        if self.show_hashes {
            println!(
                "{:<width$}{}",
                "",
                format!("{}..{}", short_id(from), short_id(to)).dimmed()
            );
        }
    }
}

impl Reporter for CliReporter {
    fn fetching(&mut self, remotes: &[String]) {
        let label = fetch_label(remotes);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Fetching {label}"));
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some((spinner, label));
    }

    fn fetched(&mut self, success: bool) {
        if let Some((spinner, label)) = self.spinner.take() {
            spinner.finish_and_clear();
            if success {
                println!("Fetching {}", label);
            }
        }
    }

    fn stashing(&mut self, count: usize) {
        let plural = if count == 1 { "" } else { "s" };
        println!("{}", format!("stashing {count} change{plural}").magenta());
    }

    fn unstashing(&mut self) {
        println!("{}", "unstashing".magenta());
    }

    fn syncing(&mut self, branch: &str, width: usize, state: SyncState) {
        let message = match state {
            SyncState::FastForwardable => "fast-forwarding...",
            _ => "rebasing...",
        };
        println!("{:<width$}{}", branch, message.yellow());
    }

    fn outcome(&mut self, branch: &str, width: usize, outcome: &SyncOutcome) {
        match outcome {
            SyncOutcome::UpToDate => println!("{:<width$}{}", branch, "up to date".green()),
            SyncOutcome::Ahead => println!("{:<width$}{}", branch, "ahead of upstream".green()),
            SyncOutcome::FastForwarded { from, to } | SyncOutcome::Rebased { from, to } => {
                self.print_hashes(width, from, to)
            }
            SyncOutcome::Skipped { state } => {
                let message = match state {
                    SyncState::FastForwardable => "behind upstream",
                    _ => "diverged from upstream",
                };
                println!(
                    "{:<width$}{} {}",
                    branch,
                    message.yellow(),
                    "(rebase.auto is off)".dimmed()
                );
            }
            SyncOutcome::Failed { .. } => println!("{:<width$}{}", branch, "failed".red()),
        }
    }

    fn returning_to(&mut self, branch: &str) {
        println!("{}", format!("returning to {branch}").magenta());
    }

    fn notice(&mut self, message: &str) {
        if let Some((spinner, _)) = &self.spinner {
            spinner.suspend(|| eprintln!("{}", message.yellow()));
        } else {
            eprintln!("{}", message.yellow());
        }
    }
}

// ============== JSON ==============

#[derive(Debug, Serialize)]
struct BranchReport {
    branch: String,
    outcome: SyncOutcome,
}

#[derive(Debug, Default, Serialize)]
pub struct JsonReport {
    fetched: Option<Vec<String>>,
    stashed_changes: usize,
    branches: Vec<BranchReport>,
    returned_to: Option<String>,
    notices: Vec<String>,
}

/// Collects everything and prints a single JSON document on [`Reporter::finish`].
#[derive(Debug, Default)]
pub struct JsonReporter {
    report: JsonReport,
}

impl JsonReporter {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.report)
    }
}

impl Reporter for JsonReporter {
    fn fetching(&mut self, remotes: &[String]) {
        self.report.fetched = Some(remotes.to_vec());
    }

    fn fetched(&mut self, _success: bool) {}

    fn stashing(&mut self, count: usize) {
        self.report.stashed_changes = count;
    }

    fn unstashing(&mut self) {}

    fn syncing(&mut self, _branch: &str, _width: usize, _state: SyncState) {}

    fn outcome(&mut self, branch: &str, _width: usize, outcome: &SyncOutcome) {
        self.report.branches.push(BranchReport {
            branch: branch.to_string(),
            outcome: outcome.clone(),
        });
    }

    fn returning_to(&mut self, branch: &str) {
        self.report.returned_to = Some(branch.to_string());
    }

    fn notice(&mut self, message: &str) {
        self.report.notices.push(message.to_string());
    }

    fn finish(&mut self) {
        match self.to_json() {
            Ok(json) => println!("{json}"),
            Err(error) => tracing::warn!("Failed to serialize report: {}", error),
        }
    }
}

/// Print a fatal error, followed by any raw git output it carries.
pub fn print_error(error: &anyhow::Error) {
    eprintln!("{} {:#}", "fatal:".red().bold(), error);
    if let Some(output) = error.downcast_ref::<SyncError>().and_then(SyncError::output) {
        for line in output.lines() {
            eprintln!("  {}", line.dimmed());
        }
    }
}
