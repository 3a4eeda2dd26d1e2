//! The update session state machine.
//!
//! ```text
//! START → PRECHECK → BACKUP → SYNC → REBUILD → VALIDATE → PACKAGE → DONE
//!            │          │       │        │          │
//!            └──────────┴───────┴────────┴──────────┴──→ ABORT
//! ```
//!
//! An abort after BACKUP restores the backup this session created, never an
//! older one. PACKAGE failures are warnings only.

use std::fmt;
use std::path::PathBuf;

use upkeep_build::{Backup, BuildError, RebuildOutcome};
use upkeep_core::{StepOutcome, Version, VersionComparison};

use crate::error::UpdateError;
use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Precheck,
    Backup,
    Sync,
    Rebuild,
    Validate,
    Package,
    Done,
    Abort,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "START",
            Stage::Precheck => "PRECHECK",
            Stage::Backup => "BACKUP",
            Stage::Sync => "SYNC",
            Stage::Rebuild => "REBUILD",
            Stage::Validate => "VALIDATE",
            Stage::Package => "PACKAGE",
            Stage::Done => "DONE",
            Stage::Abort => "ABORT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Rebuild even when no watched source changed.
    pub force_rebuild: bool,
    /// Skip the uncommitted-changes guard.
    pub allow_dirty: bool,
}

/// Result of comparing the installed and published versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Newer { current: Version, remote: Version },
    UpToDate { current: Version },
    LocalAhead { current: Version, remote: Version },
    /// No published version could be determined.
    Unknown { current: Version, reason: String },
}

/// Transient state of one session.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    pub current: Version,
    pub target: Option<Version>,
    /// The backup created by this session, if any.
    pub backup: Option<Backup>,
    pub rebuild_required: bool,
    pub stage: Stage,
    pub warnings: Vec<String>,
}

impl UpdateSession {
    pub fn new(current: Version) -> Self {
        Self {
            current,
            target: None,
            backup: None,
            rebuild_required: false,
            stage: Stage::Start,
            warnings: Vec::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!("stage {} -> {}", self.stage, stage);
        self.stage = stage;
    }
}

/// What an abort did about the session's backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    /// Aborted before anything was mutated.
    NothingToUndo,
    Restored(PathBuf),
    RestoreFailed(String),
}

/// Terminal outcome, reported once and then discarded with the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Updated {
        from: Version,
        to: Version,
        /// Version read back from the tree after sync.
        installed: Version,
        archive: Option<PathBuf>,
        warnings: Vec<String>,
    },
    Repackaged {
        version: Version,
        archive: Option<PathBuf>,
        warnings: Vec<String>,
    },
    UpToDate {
        current: Version,
    },
    LocalAhead {
        current: Version,
        remote: Version,
    },
    NoRemoteVersion {
        reason: String,
    },
    /// The user declined; nothing was touched.
    Cancelled,
    Aborted {
        stage: Stage,
        reason: String,
        rollback: Rollback,
    },
    RolledBack {
        backup: Backup,
    },
    Failed {
        reason: String,
    },
}

impl SessionOutcome {
    /// 0 for success or nothing to do, 1 for failure or cancellation.
    pub fn exit_code(&self) -> u8 {
        match self {
            SessionOutcome::Updated { .. }
            | SessionOutcome::Repackaged { .. }
            | SessionOutcome::UpToDate { .. }
            | SessionOutcome::LocalAhead { .. }
            | SessionOutcome::NoRemoteVersion { .. }
            | SessionOutcome::RolledBack { .. } => 0,
            SessionOutcome::Cancelled
            | SessionOutcome::Aborted { .. }
            | SessionOutcome::Failed { .. } => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

/// Sequences a [`Pipeline`] through one session.
pub struct Orchestrator<P> {
    pipeline: P,
    options: UpdateOptions,
}

impl<P: Pipeline> Orchestrator<P> {
    pub fn new(pipeline: P, options: UpdateOptions) -> Self {
        Self { pipeline, options }
    }

    pub fn into_pipeline(self) -> P {
        self.pipeline
    }

    // -----------------------------------------------------------------------
    // check
    // -----------------------------------------------------------------------

    /// Compare installed and published versions. Read-only.
    ///
    /// Errors only when the environment is unusable (no remotes at all).
    pub fn check(&mut self) -> Result<Availability, UpdateError> {
        let current = self.pipeline.current_version();
        tracing::info!("Current version: {current}");

        let remote = match self.pipeline.remote_version()? {
            StepOutcome::Success(remote) => remote,
            StepOutcome::Degraded { value, warning } => {
                tracing::warn!("{warning}");
                value
            }
            StepOutcome::SoftFailure { reason } => {
                tracing::warn!("no remote version available: {reason}");
                return Ok(Availability::Unknown { current, reason });
            }
        };
        tracing::info!("Remote version: {remote}");

        Ok(match VersionComparison::of(&current, &remote) {
            VersionComparison::NewerAvailable => {
                tracing::info!("Update available: {current} -> {remote}");
                Availability::Newer { current, remote }
            }
            VersionComparison::UpToDate => {
                tracing::info!("Already on latest version");
                Availability::UpToDate { current }
            }
            VersionComparison::LocalAhead => {
                tracing::info!("Local version ({current}) is newer than remote ({remote})");
                Availability::LocalAhead { current, remote }
            }
        })
    }

    // -----------------------------------------------------------------------
    // update
    // -----------------------------------------------------------------------

    /// Full update. `confirm` is asked once a newer version is known and
    /// before anything is mutated; declining cancels cleanly.
    pub fn run(&mut self, confirm: impl FnOnce(&Version, &Version) -> bool) -> SessionOutcome {
        let (current, target) = match self.check() {
            Ok(Availability::Newer { current, remote }) => (current, remote),
            Ok(Availability::UpToDate { current }) => return SessionOutcome::UpToDate { current },
            Ok(Availability::LocalAhead { current, remote }) => {
                return SessionOutcome::LocalAhead { current, remote }
            }
            Ok(Availability::Unknown { reason, .. }) => {
                return SessionOutcome::NoRemoteVersion { reason }
            }
            Err(err) => {
                tracing::error!("Error checking for updates: {err}");
                return SessionOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        if !confirm(&current, &target) {
            tracing::warn!("Update cancelled by user");
            return SessionOutcome::Cancelled;
        }

        let mut session = UpdateSession::new(current);
        session.target = Some(target);
        tracing::info!("Update process started. Current version: {current}");

        session.enter(Stage::Precheck);
        if !self.options.allow_dirty && self.pipeline.working_tree_dirty() {
            let err = UpdateError::DirtyTree;
            tracing::error!("Update aborted: {err}");
            return self.abort(&mut session, err.to_string());
        }

        session.enter(Stage::Backup);
        match self.pipeline.create_backup(&target) {
            Ok(backup) => session.backup = Some(backup),
            Err(err) => {
                tracing::error!("Failed to create backup, aborting update: {err}");
                return self.abort(&mut session, err.to_string());
            }
        }

        session.enter(Stage::Sync);
        match self.pipeline.sync(&target) {
            Ok(StepOutcome::Success(synced)) => tracing::info!("working tree at {synced}"),
            Ok(StepOutcome::Degraded { value, warning }) => {
                tracing::warn!("working tree at {value}: {warning}");
                session.warnings.push(warning);
            }
            Ok(StepOutcome::SoftFailure { reason }) => {
                tracing::error!("Failed to sync target version, rolling back: {reason}");
                return self.abort(&mut session, reason);
            }
            Err(err) => {
                tracing::error!("Failed to sync target version, rolling back: {err}");
                return self.abort(&mut session, err.to_string());
            }
        }

        let installed = self.pipeline.current_version();
        if installed != target {
            let warning =
                format!("Version mismatch after sync. Expected: {target}, Actual: {installed}");
            tracing::warn!("{warning}");
            session.warnings.push(warning);
        }

        let force = self.options.force_rebuild;
        match self.build_and_package(&mut session, force, installed) {
            Ok(archive) => {
                tracing::info!("Update completed successfully! New version: {installed}");
                SessionOutcome::Updated {
                    from: current,
                    to: target,
                    installed,
                    archive,
                    warnings: session.warnings,
                }
            }
            Err(aborted) => aborted,
        }
    }

    // -----------------------------------------------------------------------
    // repackage
    // -----------------------------------------------------------------------

    /// Rebuild unconditionally, validate and package the installed version,
    /// protected by a backup of the current build output.
    pub fn repackage(&mut self) -> SessionOutcome {
        let current = self.pipeline.current_version();
        tracing::info!("Rebuilding and repackaging version {current}");
        let mut session = UpdateSession::new(current);
        session.target = Some(current);

        session.enter(Stage::Backup);
        match self.pipeline.create_backup(&current) {
            Ok(backup) => session.backup = Some(backup),
            Err(UpdateError::Build(BuildError::NothingToSnapshot { path })) => {
                tracing::warn!(
                    path = %path.display(),
                    "no existing build output; building without a backup"
                );
            }
            Err(err) => {
                tracing::error!("Failed to create backup, aborting: {err}");
                return self.abort(&mut session, err.to_string());
            }
        }

        match self.build_and_package(&mut session, true, current) {
            Ok(archive) => {
                tracing::info!("Repackaging complete");
                SessionOutcome::Repackaged {
                    version: current,
                    archive,
                    warnings: session.warnings,
                }
            }
            Err(aborted) => aborted,
        }
    }

    // -----------------------------------------------------------------------
    // rollback
    // -----------------------------------------------------------------------

    /// Restore the most recent backup.
    pub fn rollback(&mut self) -> SessionOutcome {
        let backups = match self.pipeline.backups() {
            Ok(backups) => backups,
            Err(err) => {
                tracing::error!("Failed to list backups: {err}");
                return SessionOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };
        let Some(latest) = backups.last().cloned() else {
            let err = UpdateError::NoBackup;
            tracing::error!("{err}");
            return SessionOutcome::Failed {
                reason: err.to_string(),
            };
        };

        match self.pipeline.restore(&latest) {
            Ok(()) => SessionOutcome::RolledBack { backup: latest },
            Err(err) => {
                tracing::error!("Rollback failed: {err}");
                SessionOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // shared tail and abort
    // -----------------------------------------------------------------------

    fn build_and_package(
        &mut self,
        session: &mut UpdateSession,
        force: bool,
        version: Version,
    ) -> Result<Option<PathBuf>, SessionOutcome> {
        session.enter(Stage::Rebuild);
        match self.pipeline.rebuild(force) {
            Ok(outcome) => session.rebuild_required = outcome == RebuildOutcome::Rebuilt,
            Err(err) => {
                tracing::error!("Build failed, rolling back to previous version: {err}");
                return Err(self.abort(session, err.to_string()));
            }
        }

        session.enter(Stage::Validate);
        if let Err(err) = self.pipeline.validate() {
            tracing::error!("Build validation failed, rolling back: {err}");
            return Err(self.abort(session, err.to_string()));
        }

        session.enter(Stage::Package);
        let archive = match self.pipeline.package(&version) {
            Ok(summary) => Some(summary.path),
            Err(err) => {
                let warning = format!("Failed to create portable archive (non-critical): {err}");
                tracing::warn!("{warning}");
                session.warnings.push(warning);
                None
            }
        };

        session.enter(Stage::Done);
        Ok(archive)
    }

    fn abort(&mut self, session: &mut UpdateSession, reason: String) -> SessionOutcome {
        let stage = session.stage;
        session.enter(Stage::Abort);

        let rollback = match &session.backup {
            None => Rollback::NothingToUndo,
            Some(backup) => match self.pipeline.restore(backup) {
                Ok(()) => Rollback::Restored(backup.path.clone()),
                Err(err) => {
                    tracing::error!("Restoring {} failed: {err}", backup.path.display());
                    Rollback::RestoreFailed(err.to_string())
                }
            },
        };
        SessionOutcome::Aborted {
            stage,
            reason,
            rollback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_render_in_upper_case() {
        assert_eq!(Stage::Precheck.to_string(), "PRECHECK");
        assert_eq!(Stage::Abort.to_string(), "ABORT");
    }

    #[test]
    fn exit_codes_follow_outcome_class() {
        let v = Version::new(0, 2, 3);
        assert_eq!(SessionOutcome::UpToDate { current: v }.exit_code(), 0);
        assert_eq!(
            SessionOutcome::NoRemoteVersion { reason: "offline".into() }.exit_code(),
            0
        );
        assert_eq!(SessionOutcome::Cancelled.exit_code(), 1);
        assert_eq!(
            SessionOutcome::Aborted {
                stage: Stage::Rebuild,
                reason: "build failed".into(),
                rollback: Rollback::Restored(PathBuf::from("backup/x")),
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn new_session_starts_clean() {
        let session = UpdateSession::new(Version::new(0, 2, 2));
        assert_eq!(session.stage, Stage::Start);
        assert!(session.backup.is_none());
        assert!(!session.rebuild_required);
    }
}
