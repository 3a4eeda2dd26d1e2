//! `upkeep --check-only`: report whether a newer release exists.
//!
//! Always exits 0, except that `--exit-code` turns "already on the latest
//! version" into exit 2.

use anyhow::Result;

use upkeep_session::{Availability, Installation, Orchestrator, UpdateOptions};

use crate::Context;

/// Exit status for "already on the latest version" under `--exit-code`.
pub const EXIT_UP_TO_DATE: u8 = 2;

pub fn run(ctx: &Context, exit_code: bool) -> Result<u8> {
    let availability = Installation::open(&ctx.root, ctx.config.clone())
        .and_then(|installation| Orchestrator::new(installation, UpdateOptions::default()).check());

    match availability {
        Ok(Availability::Newer { remote, .. }) => {
            super::ok(&format!("Update available: {remote}"));
            super::detail("Run 'upkeep' to install");
            println!();
            Ok(0)
        }
        Ok(Availability::UpToDate { .. }) | Ok(Availability::LocalAhead { .. }) => {
            super::ok("Already on latest version");
            println!();
            Ok(if exit_code { EXIT_UP_TO_DATE } else { 0 })
        }
        Ok(Availability::Unknown { reason, .. }) => {
            super::ok("No update available");
            super::warning(&format!("Remote version unknown: {reason}"));
            println!();
            Ok(0)
        }
        Err(err) => Ok(report_failure(&anyhow::Error::new(err))),
    }
}

/// Log and print a failed check. The check still exits 0.
pub fn report_failure(err: &anyhow::Error) -> u8 {
    let message = super::describe(err);
    tracing::error!("Error checking for updates: {message}");
    super::error(&format!("Update check failed: {message}"));
    println!();
    0
}
