//! Remote and branch selection.
//!
//! Remote precedence: configured name → fallback name → first listed remote.
//! Branch precedence: configured name → fallback name → lexicographically
//! first published branch.
//!
//! A resolver is created once per session and handed to every step that needs
//! a remote. Successful answers are remembered for the resolver's lifetime;
//! failed or degraded answers are not, so a later call asks again.

use upkeep_core::{RemoteConfig, UpdaterConfig};

use crate::error::VcsError;
use crate::git::Vcs;

#[derive(Debug, Clone)]
pub struct RemoteResolver {
    preferred_remote: String,
    fallback_remote: String,
    preferred_branch: String,
    fallback_branch: String,
    remote: Option<String>,
    branch: Option<String>,
}

impl RemoteResolver {
    pub fn new(
        preferred_remote: impl Into<String>,
        fallback_remote: impl Into<String>,
        preferred_branch: impl Into<String>,
        fallback_branch: impl Into<String>,
    ) -> Self {
        Self {
            preferred_remote: preferred_remote.into(),
            fallback_remote: fallback_remote.into(),
            preferred_branch: preferred_branch.into(),
            fallback_branch: fallback_branch.into(),
            remote: None,
            branch: None,
        }
    }

    pub fn from_config(config: &UpdaterConfig) -> Self {
        Self::new(
            &config.remote,
            &config.fallback_remote,
            &config.branch,
            &config.fallback_branch,
        )
    }

    /// Pick the remote to operate against.
    ///
    /// Fails with [`VcsError::NoRemotes`] when the repository has none, or with
    /// the listing error itself; neither is cached.
    pub fn resolve_remote(&mut self, vcs: &dyn Vcs) -> Result<String, VcsError> {
        if let Some(remote) = &self.remote {
            return Ok(remote.clone());
        }

        let remotes = vcs.remotes().map_err(|err| {
            tracing::error!(error = %err, "unable to list remotes");
            err
        })?;
        if remotes.is_empty() {
            tracing::error!("no remotes configured");
            return Err(VcsError::NoRemotes);
        }

        let chosen = first_preferred(&remotes, &self.preferred_remote, &self.fallback_remote)
            .unwrap_or_else(|| remotes[0].clone());
        if chosen != self.preferred_remote {
            tracing::warn!(
                "configured remote '{}' not found; using '{}'",
                self.preferred_remote,
                chosen
            );
        }
        self.remote = Some(chosen.clone());
        Ok(chosen)
    }

    /// Pick the branch on `remote`.
    ///
    /// Never fails: when the branch list cannot be read (or is empty) the
    /// configured name is returned, uncached.
    pub fn resolve_branch(&mut self, vcs: &dyn Vcs, remote: &str) -> String {
        if let Some(branch) = &self.branch {
            return branch.clone();
        }

        let mut branches = match vcs.remote_branches(remote) {
            Ok(branches) => branches,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "unable to list branches on '{remote}'; defaulting to '{}'",
                    self.preferred_branch
                );
                return self.preferred_branch.clone();
            }
        };
        if branches.is_empty() {
            tracing::warn!(
                "no branches published on '{remote}'; defaulting to '{}'",
                self.preferred_branch
            );
            return self.preferred_branch.clone();
        }

        let chosen = match first_preferred(&branches, &self.preferred_branch, &self.fallback_branch)
        {
            Some(found) => found,
            None => {
                branches.sort();
                branches.swap_remove(0)
            }
        };
        if chosen != self.preferred_branch {
            tracing::warn!(
                "configured branch '{}' not found on '{remote}'; using '{}'",
                self.preferred_branch,
                chosen
            );
        }
        self.branch = Some(chosen.clone());
        chosen
    }

    /// Resolve both halves into a [`RemoteConfig`].
    pub fn resolve(&mut self, vcs: &dyn Vcs) -> Result<RemoteConfig, VcsError> {
        let remote = self.resolve_remote(vcs)?;
        let branch = self.resolve_branch(vcs, &remote);
        Ok(RemoteConfig { remote, branch })
    }

    /// The cached selection, if both halves have been resolved.
    pub fn cached(&self) -> Option<RemoteConfig> {
        Some(RemoteConfig {
            remote: self.remote.clone()?,
            branch: self.branch.clone()?,
        })
    }
}

fn first_preferred(available: &[String], preferred: &str, fallback: &str) -> Option<String> {
    [preferred, fallback]
        .into_iter()
        .find(|candidate| available.iter().any(|a| a == candidate))
        .map(str::to_owned)
}
