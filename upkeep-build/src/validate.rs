//! Post-build smoke check.

use std::path::Path;

use crate::error::{io_err, BuildError};

/// The artifact must exist and be non-empty. Returns its size in bytes.
pub fn validate(artifact: &Path) -> Result<u64, BuildError> {
    tracing::info!("validating build: {}", artifact.display());
    let meta = match std::fs::metadata(artifact) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!("validation failed: artifact not found at {}", artifact.display());
            return Err(BuildError::ArtifactMissing {
                path: artifact.to_path_buf(),
            });
        }
        Err(e) => return Err(io_err(artifact, e)),
    };
    if !meta.is_file() || meta.len() == 0 {
        tracing::error!("validation failed: artifact is empty or not a file");
        return Err(BuildError::ArtifactEmpty {
            path: artifact.to_path_buf(),
        });
    }
    tracing::info!(bytes = meta.len(), "build validation passed");
    Ok(meta.len())
}
