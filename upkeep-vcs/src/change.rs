//! Rebuild gate: did any watched source file change against the remote branch?
//!
//! Fail-open: every resolution or command failure answers "changed".

use std::path::PathBuf;

use crate::git::Vcs;
use crate::resolver::RemoteResolver;

/// `true` when any of `paths` differs between `HEAD` and the resolved
/// remote-tracking branch, or when that cannot be determined.
pub fn changed(vcs: &dyn Vcs, resolver: &mut RemoteResolver, paths: &[PathBuf]) -> bool {
    let target = match resolver.resolve(vcs) {
        Ok(target) => target,
        Err(err) => {
            tracing::error!(error = %err, "cannot resolve remote for change detection; assuming changed");
            return true;
        }
    };

    if let Err(err) = vcs.fetch_branch(&target.remote, &target.branch) {
        tracing::error!(error = %err, "fetching {target} failed; assuming changed");
        return true;
    }

    let tracking = target.tracking_ref();
    for path in paths {
        match vcs.diff("HEAD", &tracking, path) {
            Ok(diff) if !diff.trim().is_empty() => {
                tracing::info!(path = %path.display(), "source differs from {tracking}");
                return true;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(
                    path = %path.display(),
                    error = %err,
                    "diff against {tracking} failed; assuming changed"
                );
                return true;
            }
        }
    }
    false
}
