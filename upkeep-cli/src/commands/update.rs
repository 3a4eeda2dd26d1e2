//! Default mode (full update) and `upkeep --repackage`.

use std::io::{self, BufRead, Write};

use anyhow::Result;

use upkeep_core::Version;
use upkeep_session::{
    Installation, Orchestrator, Rollback, SessionLock, SessionOutcome, Stage, UpdateOptions,
};

use crate::{Cli, Context};

pub fn run(ctx: &Context, cli: &Cli) -> Result<u8> {
    let Some(_lock) = lock(ctx) else {
        return Ok(1);
    };
    let options = UpdateOptions {
        force_rebuild: cli.force_rebuild,
        allow_dirty: cli.allow_dirty,
    };
    let installation = Installation::open(&ctx.root, ctx.config.clone())?;
    let mut orchestrator = Orchestrator::new(installation, options);

    let assume_yes = cli.yes;
    let outcome = orchestrator.run(|_current, target| confirm(target, assume_yes));
    report(ctx, &outcome);
    Ok(outcome.exit_code())
}

pub fn repackage(ctx: &Context) -> Result<u8> {
    let Some(_lock) = lock(ctx) else {
        return Ok(1);
    };
    let installation = Installation::open(&ctx.root, ctx.config.clone())?;
    let mut orchestrator = Orchestrator::new(installation, UpdateOptions::default());

    let outcome = orchestrator.repackage();
    report(ctx, &outcome);
    Ok(outcome.exit_code())
}

fn lock(ctx: &Context) -> Option<SessionLock> {
    match SessionLock::acquire(&ctx.root) {
        Ok(lock) => Some(lock),
        Err(err) => {
            super::error(&err.to_string());
            println!();
            None
        }
    }
}

/// Announce the update and ask before anything is touched.
///
/// End of input counts as "no".
fn confirm(target: &Version, assume_yes: bool) -> bool {
    println!("\n-> Update available: {target}");
    println!("  WARNING: This operation may perform a hard reset to the target release tag.");
    println!("  Uncommitted local changes can be lost unless you abort now.\n");

    let proceed = assume_yes || prompt("Continue with update? [y/N]: ");
    if proceed {
        println!("Starting update process...\n");
    }
    proceed
}

fn prompt(question: &str) -> bool {
    print!("{question}");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(0) | Err(_) => false,
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
    }
}

fn report(ctx: &Context, outcome: &SessionOutcome) {
    let log = ctx.config.log_file_at(&ctx.root);
    match outcome {
        SessionOutcome::Updated {
            installed,
            archive,
            warnings,
            ..
        } => {
            super::ok("Update completed successfully!");
            super::detail(&format!("Installed version: {installed}"));
            if let Some(archive) = archive {
                super::detail(&format!("Portable archive: {}", archive.display()));
            }
            for warning in warnings {
                super::warning(warning);
            }
            super::detail("Restart application to apply updates");
        }
        SessionOutcome::Repackaged {
            version,
            archive,
            warnings,
        } => {
            super::ok(&format!("Repackaging of {version} complete"));
            if let Some(archive) = archive {
                super::detail(&format!("Portable archive: {}", archive.display()));
            }
            for warning in warnings {
                super::warning(warning);
            }
        }
        SessionOutcome::UpToDate { .. } | SessionOutcome::LocalAhead { .. } => {
            super::ok("Already on latest version");
        }
        SessionOutcome::NoRemoteVersion { reason } => {
            super::ok("No update available");
            super::warning(&format!("Remote version unknown: {reason}"));
        }
        SessionOutcome::Cancelled => super::cancelled("Update cancelled by user"),
        SessionOutcome::Aborted {
            stage,
            reason,
            rollback,
        } => {
            super::error(&format!(
                "Update failed at {stage} - see {} for details",
                log.display()
            ));
            super::detail(reason);
            match rollback {
                Rollback::NothingToUndo => super::detail("Nothing was changed."),
                Rollback::Restored(path) => {
                    super::detail(&format!("Build output restored from {}", path.display()));
                    if matches!(stage, Stage::Rebuild | Stage::Validate) {
                        super::detail("Source tree remains at the synchronized release.");
                    }
                }
                Rollback::RestoreFailed(err) => super::warning(&format!("Rollback failed: {err}")),
            }
        }
        SessionOutcome::RolledBack { backup } => {
            super::ok(&format!("Restored {}", backup.path.display()));
        }
        SessionOutcome::Failed { reason } => {
            super::error(&format!(
                "Update failed: {reason} - see {} for details",
                log.display()
            ));
        }
    }
    println!();
}
