//! Error types for upkeep-vcs.

use thiserror::Error;

use upkeep_core::ProcessError;

/// All errors that can arise from version-control operations.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The command could not run to completion (spawn failure, timeout, I/O).
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The command ran and exited non-zero.
    #[error("`{command}` failed (exit {}): {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The repository has no remotes at all.
    #[error("no version-control remotes configured")]
    NoRemotes,
}

impl VcsError {
    /// `true` when the underlying command was killed for exceeding its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, VcsError::Process(p) if p.is_timeout())
    }
}
