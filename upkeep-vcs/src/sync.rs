//! Working-tree synchronization to an exact release.
//!
//! 1. Force-fetch all tags from the resolved remote.
//! 2. Tag resolvable → hard reset to it (`Success`).
//! 3. Tag still missing, or the tag fetch timed out → fast-forward pull of
//!    the resolved branch (`Degraded`).
//!
//! Any other failure is a hard error for the caller to roll back on. Callers
//! must check [`is_dirty`] first: the reset discards local changes.

use std::fmt;

use upkeep_core::{ReleaseTag, RemoteConfig, StepOutcome, Version};

use crate::error::VcsError;
use crate::git::Vcs;
use crate::resolver::RemoteResolver;

/// Where the working tree ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    /// Exactly the release tag.
    Tag(ReleaseTag),
    /// The tip of a branch (degraded path).
    BranchTip(RemoteConfig),
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTarget::Tag(tag) => write!(f, "tag {tag}"),
            SyncTarget::BranchTip(rc) => write!(f, "branch {rc}"),
        }
    }
}

/// Whether the working tree has uncommitted changes.
///
/// Fail-safe: a status that cannot be read counts as dirty.
pub fn is_dirty(vcs: &dyn Vcs) -> bool {
    match vcs.status() {
        Ok(status) => !status.trim().is_empty(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to read working tree status; assuming dirty");
            true
        }
    }
}

/// Move the working tree to the release tag for `target`.
pub fn sync_to_tag(
    vcs: &dyn Vcs,
    resolver: &mut RemoteResolver,
    tag_prefix: &str,
    target: &Version,
) -> Result<StepOutcome<SyncTarget>, VcsError> {
    let tag = ReleaseTag::for_version(tag_prefix, target);
    let remote = resolver.resolve_remote(vcs)?;

    match vcs.fetch_tags(&remote) {
        Ok(()) => {}
        Err(err) if err.is_timeout() => {
            let warning = format!("fetching tags for {tag} timed out; falling back to branch pull");
            tracing::warn!("{warning}");
            return pull(vcs, resolver, &remote, warning);
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to fetch tags from '{remote}'");
            return Err(err);
        }
    }

    if vcs.tag_exists(&tag)? {
        tracing::info!("syncing repository to release tag {tag}");
        vcs.reset_hard(&tag).map_err(|err| {
            tracing::error!(error = %err, "failed to reset to {tag}");
            err
        })?;
        tracing::info!("repository synced to {tag}");
        return Ok(StepOutcome::Success(SyncTarget::Tag(tag)));
    }

    let warning = format!("target tag {tag} not available after fetch; falling back to branch pull");
    tracing::warn!("{warning}");
    pull(vcs, resolver, &remote, warning)
}

fn pull(
    vcs: &dyn Vcs,
    resolver: &mut RemoteResolver,
    remote: &str,
    warning: String,
) -> Result<StepOutcome<SyncTarget>, VcsError> {
    let branch = resolver.resolve_branch(vcs, remote);
    tracing::info!("pulling changes from {remote}/{branch}");
    vcs.pull_ff_only(remote, &branch).map_err(|err| {
        tracing::error!(error = %err, "pull from {remote}/{branch} failed");
        err
    })?;
    tracing::info!("changes pulled successfully");
    Ok(StepOutcome::degraded(
        SyncTarget::BranchTip(RemoteConfig {
            remote: remote.to_string(),
            branch,
        }),
        warning,
    ))
}
