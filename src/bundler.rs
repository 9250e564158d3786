//! Optional `bundle check` after the branches are synced.

use std::{io, path::Path, process::Command};

use crate::{
    error::{Result, SyncError},
    report::Reporter,
    vcs::CommandOutput,
};

const BUNDLE: &str = "bundle";

/// Make sure the gems in the work tree's `Gemfile` are installed.
pub fn check(workdir: &Path, autoinstall: bool, reporter: &mut dyn Reporter) -> Result<()> {
    check_with(BUNDLE, workdir, autoinstall, reporter)
}

fn check_with(
    program: &str,
    workdir: &Path,
    autoinstall: bool,
    reporter: &mut dyn Reporter,
) -> Result<()> {
    if !workdir.join("Gemfile").is_file() {
        tracing::debug!("No Gemfile in {}, skipping bundler check", workdir.display());
        return Ok(());
    }

    let Some(checked) = run(program, workdir, "check")? else {
        reporter.notice(&format!("`{program}` is not installed; skipping the bundler check"));
        return Ok(());
    };
    if checked.success {
        return Ok(());
    }

    if !autoinstall {
        reporter.notice(
            "Gems are missing. Run `bundle install`, or set git-up.bundler.autoinstall to do it automatically.",
        );
        return Ok(());
    }

    reporter.notice("Gems are missing; running `bundle install`");
    match run(program, workdir, "install")? {
        Some(installed) if installed.success => Ok(()),
        Some(installed) => Err(SyncError::BundlerFailed {
            output: installed.output,
        }),
        None => Err(SyncError::BundlerFailed {
            output: format!("`{program}` disappeared"),
        }),
    }
}

/// Run `<program> <subcommand>`, or `None` when the program is missing.
fn run(program: &str, workdir: &Path, subcommand: &str) -> Result<Option<CommandOutput>> {
    tracing::debug!("Running `{} {}`", program, subcommand);
    let out = match Command::new(program)
        .arg(subcommand)
        .current_dir(workdir)
        .output()
    {
        Ok(out) => out,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(anyhow::Error::new(error)
                .context(format!("running {program} {subcommand}"))
                .into());
        }
    };
    let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&out.stderr));
    Ok(Some(CommandOutput {
        success: out.status.success(),
        output,
    }))
}
