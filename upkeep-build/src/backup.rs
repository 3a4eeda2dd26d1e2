//! Point-in-time snapshots of the build-output directory.
//!
//! Layout under the backup root:
//!
//! ```text
//! backup/
//! └── v0.2.2_backup_20260301_141502_123456/
//!     ├── manifest.json      version, timestamp, SHA-256 per file
//!     └── snapshot/          full copy of the build directory
//! ```
//!
//! Restores never expose a half-written build directory: the snapshot is
//! copied to a staging sibling, verified against the manifest, then swapped
//! in with two renames.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use upkeep_core::Version;

use crate::error::{io_err, BuildError};
use crate::tree;

const SNAPSHOT_DIR: &str = "snapshot";
const MANIFEST_FILE: &str = "manifest.json";
const NAME_MARKER: &str = "_backup_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// One snapshot on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Version the snapshot was taken for (the update target).
    pub version: Version,
    pub created_at: NaiveDateTime,
    /// The backup directory (parent of `snapshot/`).
    pub path: PathBuf,
}

impl Backup {
    pub fn snapshot_dir(&self) -> PathBuf {
        self.path.join(SNAPSHOT_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Parse `v<version>_backup_<timestamp>` directory names.
    pub fn from_dir(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let (version, stamp) = name.strip_prefix('v')?.split_once(NAME_MARKER)?;
        Some(Self {
            version: Version::parse(version).ok()?,
            created_at: NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?,
            path: path.to_path_buf(),
        })
    }

    fn dir_name(version: &Version, created_at: &NaiveDateTime) -> String {
        format!("v{version}{NAME_MARKER}{}", created_at.format(TIMESTAMP_FORMAT))
    }
}

/// `manifest.json` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotManifest {
    pub version: Version,
    pub created_at: DateTime<Utc>,
    /// Relative path → SHA-256 hex digest.
    pub files: BTreeMap<String, String>,
}

impl SnapshotManifest {
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, path: &Path) -> Result<(), BuildError> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))
    }
}

/// Creates, lists and restores snapshots of one build directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_root: PathBuf,
    build_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backup_root: impl Into<PathBuf>, build_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_root: backup_root.into(),
            build_dir: build_dir.into(),
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    // -----------------------------------------------------------------------
    // create
    // -----------------------------------------------------------------------

    /// Snapshot the build directory, tagged with `version`.
    ///
    /// Fails with [`BuildError::NothingToSnapshot`] when there is no build
    /// output yet. A partially written backup is removed before returning an
    /// error.
    pub fn create(&self, version: &Version) -> Result<Backup, BuildError> {
        if !self.build_dir.is_dir() {
            tracing::error!(
                path = %self.build_dir.display(),
                "build directory not found; nothing to back up"
            );
            return Err(BuildError::NothingToSnapshot {
                path: self.build_dir.clone(),
            });
        }
        std::fs::create_dir_all(&self.backup_root).map_err(|e| io_err(&self.backup_root, e))?;

        let (backup, created_at) = self.reserve(version)?;
        tracing::info!(path = %backup.path.display(), "creating backup");

        match self.fill(&backup, created_at) {
            Ok(files) => {
                tracing::info!(files, "backup created at {}", backup.path.display());
                Ok(backup)
            }
            Err(err) => {
                tracing::error!(error = %err, "backup failed; removing partial copy");
                if let Err(cleanup) = tree::remove(&backup.path) {
                    tracing::warn!(error = %cleanup, "could not remove partial backup");
                }
                Err(err)
            }
        }
    }

    /// Create a fresh, uniquely named backup directory.
    fn reserve(&self, version: &Version) -> Result<(Backup, DateTime<Utc>), BuildError> {
        loop {
            let now = Utc::now();
            let created_at = now.naive_utc();
            let path = self.backup_root.join(Backup::dir_name(version, &created_at));
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    // Round-trip through the name so `created_at` matches `list()`.
                    let backup = Backup::from_dir(&path).unwrap_or(Backup {
                        version: *version,
                        created_at,
                        path,
                    });
                    return Ok((backup, now));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                Err(e) => return Err(io_err(&path, e)),
            }
        }
    }

    fn fill(&self, backup: &Backup, created_at: DateTime<Utc>) -> Result<u64, BuildError> {
        let snapshot = backup.snapshot_dir();
        let copied = tree::copy_tree(&self.build_dir, &snapshot)?;
        let manifest = SnapshotManifest {
            version: backup.version,
            created_at,
            files: tree::digest(&snapshot)?,
        };
        manifest.save(&backup.manifest_path())?;
        Ok(copied)
    }

    // -----------------------------------------------------------------------
    // list
    // -----------------------------------------------------------------------

    /// All backups, oldest first. Unrecognised entries are ignored.
    pub fn list(&self) -> Result<Vec<Backup>, BuildError> {
        if !self.backup_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut backups = Vec::new();
        let entries =
            std::fs::read_dir(&self.backup_root).map_err(|e| io_err(&self.backup_root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&self.backup_root, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match Backup::from_dir(&path) {
                Some(backup) => backups.push(backup),
                None => tracing::debug!(path = %path.display(), "skipping non-backup entry"),
            }
        }
        backups.sort_by(|a, b| (a.created_at, &a.path).cmp(&(b.created_at, &b.path)));
        Ok(backups)
    }

    /// Most recently created backup, if any.
    pub fn latest(&self) -> Result<Option<Backup>, BuildError> {
        Ok(self.list()?.pop())
    }

    // -----------------------------------------------------------------------
    // restore
    // -----------------------------------------------------------------------

    /// Replace the build directory with `backup`'s snapshot.
    ///
    /// Idempotent: restoring the same backup twice leaves the same tree.
    pub fn restore(&self, backup: &Backup) -> Result<(), BuildError> {
        let snapshot = backup.snapshot_dir();
        if !snapshot.is_dir() {
            tracing::error!(path = %backup.path.display(), "backup has no snapshot");
            return Err(BuildError::SnapshotMissing {
                path: backup.path.clone(),
            });
        }
        tracing::info!("restoring from backup {}", backup.path.display());

        let staging = self.sibling("upkeep-restore");
        let displaced = self.sibling("upkeep-displaced");
        tree::remove(&staging)?;
        tree::remove(&displaced)?;
        if let Some(parent) = self.build_dir.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        if let Err(err) = self.stage(backup, &snapshot, &staging) {
            if let Err(cleanup) = tree::remove(&staging) {
                tracing::warn!(error = %cleanup, "could not remove restore staging directory");
            }
            return Err(err);
        }

        let had_live = self.build_dir.exists();
        if had_live {
            std::fs::rename(&self.build_dir, &displaced)
                .map_err(|e| io_err(&self.build_dir, e))?;
        }
        if let Err(e) = std::fs::rename(&staging, &self.build_dir) {
            if had_live {
                if let Err(back) = std::fs::rename(&displaced, &self.build_dir) {
                    tracing::error!(error = %back, "could not put the live build directory back");
                }
            }
            return Err(io_err(&self.build_dir, e));
        }
        if let Err(err) = tree::remove(&displaced) {
            tracing::warn!(error = %err, "could not remove replaced build directory");
        }

        tracing::info!("restore completed from {}", backup.path.display());
        Ok(())
    }

    fn stage(&self, backup: &Backup, snapshot: &Path, staging: &Path) -> Result<(), BuildError> {
        tree::copy_tree(snapshot, staging)?;

        let manifest_path = backup.manifest_path();
        if !manifest_path.exists() {
            tracing::warn!(
                path = %backup.path.display(),
                "backup has no manifest; restoring unverified"
            );
            return Ok(());
        }
        let manifest = SnapshotManifest::load(&manifest_path)?;
        let staged = tree::digest(staging)?;
        let mismatched = mismatches(&manifest.files, &staged);
        if mismatched > 0 {
            tracing::error!(mismatched, "snapshot does not match its manifest");
            return Err(BuildError::SnapshotCorrupt {
                path: backup.path.clone(),
                mismatched,
            });
        }
        Ok(())
    }

    /// `<build_dir>.<suffix>` next to the build directory.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .build_dir
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.build_dir.with_file_name(name)
    }
}

fn mismatches(expected: &BTreeMap<String, String>, actual: &BTreeMap<String, String>) -> usize {
    let missing_or_changed = expected
        .iter()
        .filter(|(name, hash)| actual.get(*name) != Some(*hash))
        .count();
    let extra = actual.keys().filter(|name| !expected.contains_key(*name)).count();
    missing_or_changed + extra
}
