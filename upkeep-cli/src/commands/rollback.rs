//! `upkeep --rollback`: restore the most recent backup.

use anyhow::Result;

use upkeep_session::{Installation, Orchestrator, SessionLock, SessionOutcome, UpdateOptions};

use crate::Context;

pub fn run(ctx: &Context) -> Result<u8> {
    let _lock = match SessionLock::acquire(&ctx.root) {
        Ok(lock) => lock,
        Err(err) => {
            super::error(&err.to_string());
            println!();
            return Ok(1);
        }
    };
    let installation = Installation::open(&ctx.root, ctx.config.clone())?;
    let mut orchestrator = Orchestrator::new(installation, UpdateOptions::default());

    let outcome = orchestrator.rollback();
    match &outcome {
        SessionOutcome::RolledBack { backup } => {
            super::ok("Rollback successful");
            super::detail(&format!(
                "Restored v{} from {}",
                backup.version,
                backup.path.display()
            ));
        }
        SessionOutcome::Failed { reason } => {
            super::error(&format!("Rollback failed: {reason}"));
        }
        other => super::error(&format!("Unexpected rollback outcome: {other:?}")),
    }
    println!();
    Ok(outcome.exit_code())
}
