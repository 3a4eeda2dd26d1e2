//! Exclusive advisory lock on the installation root.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{io_err, UpdateError};

pub const LOCK_FILE: &str = ".upkeep.lock";

/// Held for the duration of a mutating session; released on drop.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
    _file: File,
}

impl SessionLock {
    /// Take the lock on `<root>/.upkeep.lock` without blocking.
    pub fn acquire(root: &Path) -> Result<Self, UpdateError> {
        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;

        if file.try_lock_exclusive().is_err() {
            tracing::error!(path = %path.display(), "another update session holds the lock");
            return Err(UpdateError::Locked { path });
        }
        tracing::debug!(path = %path.display(), "session lock acquired");
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_session_is_refused_while_first_holds_the_lock() {
        let root = TempDir::new().unwrap();
        let first = SessionLock::acquire(root.path()).unwrap();
        assert!(first.path().ends_with(LOCK_FILE));

        let err = SessionLock::acquire(root.path()).unwrap_err();
        assert!(matches!(err, UpdateError::Locked { .. }));

        drop(first);
        SessionLock::acquire(root.path()).unwrap();
    }

    #[test]
    fn missing_root_is_an_io_error() {
        let root = TempDir::new().unwrap();
        let err = SessionLock::acquire(&root.path().join("absent")).unwrap_err();
        assert!(matches!(err, UpdateError::Io { .. }));
    }
}
