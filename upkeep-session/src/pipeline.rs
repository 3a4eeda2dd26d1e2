//! The steps an update session is made of, behind one seam.
//!
//! [`Orchestrator`](crate::Orchestrator) only sequences; every step that
//! touches git, the filesystem or the build tool goes through [`Pipeline`].
//! [`Installation`] is the real implementation.

use std::path::{Path, PathBuf};

use upkeep_build::{package, validate, Backup, BackupManager, Builder, PackageSummary, RebuildOutcome};
use upkeep_core::{StepOutcome, UpdaterConfig, Version};
use upkeep_vcs::{sync, GitCli, RemoteResolver, SyncTarget, Vcs, VersionResolver};

use crate::error::UpdateError;

pub trait Pipeline {
    /// Installed version; never fails (falls back to `0.0.0`).
    fn current_version(&mut self) -> Version;

    /// Newest published version. Soft failures are not errors.
    fn remote_version(&mut self) -> Result<StepOutcome<Version>, UpdateError>;

    /// Fail-safe: unknown counts as dirty.
    fn working_tree_dirty(&mut self) -> bool;

    /// Snapshot the build output under the name of the version being
    /// installed (the target of an update, the current one on repackage).
    fn create_backup(&mut self, version: &Version) -> Result<Backup, UpdateError>;

    fn sync(&mut self, target: &Version) -> Result<StepOutcome<SyncTarget>, UpdateError>;

    fn rebuild(&mut self, force: bool) -> Result<RebuildOutcome, UpdateError>;

    fn validate(&mut self) -> Result<(), UpdateError>;

    fn package(&mut self, version: &Version) -> Result<PackageSummary, UpdateError>;

    fn restore(&mut self, backup: &Backup) -> Result<(), UpdateError>;

    /// All backups, oldest first.
    fn backups(&mut self) -> Result<Vec<Backup>, UpdateError>;
}

/// A real installation: a git checkout with a build-output directory.
pub struct Installation<V> {
    root: PathBuf,
    config: UpdaterConfig,
    vcs: V,
    remotes: RemoteResolver,
    versions: VersionResolver,
    backups: BackupManager,
    builder: Builder,
}

impl Installation<GitCli> {
    /// Open the installation at `root` using the system `git`.
    pub fn open(root: &Path, config: UpdaterConfig) -> Result<Self, UpdateError> {
        let git = GitCli::new(root, config.timeouts.clone());
        Self::new(root, config, git)
    }
}

impl<V: Vcs> Installation<V> {
    pub fn new(root: &Path, config: UpdaterConfig, vcs: V) -> Result<Self, UpdateError> {
        Ok(Self {
            remotes: RemoteResolver::from_config(&config),
            versions: VersionResolver::from_config(&config, root)?,
            backups: BackupManager::new(config.backup_dir_at(root), config.build_dir_at(root)),
            builder: Builder::from_config(&config, root),
            root: root.to_path_buf(),
            config,
            vcs,
        })
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn backup_manager(&self) -> &BackupManager {
        &self.backups
    }
}

impl<V: Vcs> Pipeline for Installation<V> {
    fn current_version(&mut self) -> Version {
        self.versions.current(&self.vcs)
    }

    fn remote_version(&mut self) -> Result<StepOutcome<Version>, UpdateError> {
        Ok(self.versions.remote(&self.vcs, &mut self.remotes)?)
    }

    fn working_tree_dirty(&mut self) -> bool {
        sync::is_dirty(&self.vcs)
    }

    fn create_backup(&mut self, version: &Version) -> Result<Backup, UpdateError> {
        Ok(self.backups.create(version)?)
    }

    fn sync(&mut self, target: &Version) -> Result<StepOutcome<SyncTarget>, UpdateError> {
        let prefix = self.versions.tag_prefix().to_string();
        Ok(sync::sync_to_tag(&self.vcs, &mut self.remotes, &prefix, target)?)
    }

    fn rebuild(&mut self, force: bool) -> Result<RebuildOutcome, UpdateError> {
        Ok(self.builder.rebuild(force, &self.vcs, &mut self.remotes)?)
    }

    fn validate(&mut self) -> Result<(), UpdateError> {
        validate::validate(&self.config.artifact_at(&self.root))?;
        Ok(())
    }

    fn package(&mut self, version: &Version) -> Result<PackageSummary, UpdateError> {
        let archive = self.config.archive_at(&self.root, version);
        Ok(package::package(self.backups.build_dir(), &archive)?)
    }

    fn restore(&mut self, backup: &Backup) -> Result<(), UpdateError> {
        Ok(self.backups.restore(backup)?)
    }

    fn backups(&mut self) -> Result<Vec<Backup>, UpdateError> {
        Ok(self.backups.list()?)
    }
}
