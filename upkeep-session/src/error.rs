//! Error types for upkeep-session.

use std::path::PathBuf;

use thiserror::Error;

use upkeep_build::BuildError;
use upkeep_core::CoreError;
use upkeep_vcs::VcsError;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// The working tree has uncommitted changes.
    #[error("uncommitted local changes detected; commit or stash them, or rerun with --allow-dirty")]
    DirtyTree,

    /// Another session holds the installation lock.
    #[error("another update session is running (lock held on {path})")]
    Locked { path: PathBuf },

    #[error("no backups available for rollback")]
    NoBackup,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> UpdateError {
    UpdateError::Io {
        path: path.into(),
        source,
    }
}
