//! Error types for upkeep-build.

use std::path::PathBuf;

use thiserror::Error;

use upkeep_core::ProcessError;

/// All errors that can arise from backup, build, validation and packaging.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// There is no build-output directory to snapshot.
    #[error("build directory not found: {path}")]
    NothingToSnapshot { path: PathBuf },

    /// A backup directory exists but holds no snapshot.
    #[error("backup has no snapshot: {path}")]
    SnapshotMissing { path: PathBuf },

    /// The staged copy of a snapshot does not match its manifest.
    #[error("snapshot at {path} does not match its manifest ({mismatched} file(s) differ)")]
    SnapshotCorrupt { path: PathBuf, mismatched: usize },

    /// Snapshot manifest (de)serialization.
    #[error("snapshot manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("build command is empty")]
    EmptyCommand,

    /// The build command could not run to completion.
    #[error("build process error: {0}")]
    Process(#[from] ProcessError),

    /// The build command exited non-zero.
    #[error("build failed (exit {}); see {}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()), .log.display())]
    BuildFailed { code: Option<i32>, log: PathBuf },

    #[error("artifact not found: {path}")]
    ArtifactMissing { path: PathBuf },

    #[error("artifact is empty: {path}")]
    ArtifactEmpty { path: PathBuf },

    /// Archive writer failure.
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl BuildError {
    /// `true` when the build was killed at its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BuildError::Process(p) if p.is_timeout())
    }
}

/// Convenience constructor for [`BuildError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.into(),
        source,
    }
}
