//! Installed vs. published version.

use std::path::{Path, PathBuf};

use regex::Regex;

use upkeep_core::{CoreError, StepOutcome, UpdaterConfig, Version, VersionComparison};

use crate::error::VcsError;
use crate::git::Vcs;
use crate::resolver::RemoteResolver;

/// Reads the embedded version and discovers the newest release tag.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    version_file: PathBuf,
    pattern: Regex,
    tag_prefix: String,
}

impl VersionResolver {
    pub fn new(version_file: impl Into<PathBuf>, pattern: Regex, tag_prefix: impl Into<String>) -> Self {
        Self {
            version_file: version_file.into(),
            pattern,
            tag_prefix: tag_prefix.into(),
        }
    }

    pub fn from_config(config: &UpdaterConfig, root: &Path) -> Result<Self, CoreError> {
        Ok(Self::new(
            config.version_file_at(root),
            config.version_regex()?,
            &config.tag_prefix,
        ))
    }

    pub fn tag_prefix(&self) -> &str {
        &self.tag_prefix
    }

    /// Installed version: embedded string, else the checkout's tag, else `0.0.0`.
    pub fn current(&self, vcs: &dyn Vcs) -> Version {
        if let Some(version) = self.embedded() {
            return version;
        }

        match vcs.describe_tag() {
            Ok(Some(tag)) => match tag.version(&self.tag_prefix) {
                Some(version) => {
                    tracing::debug!(%tag, "installed version taken from checkout tag");
                    version
                }
                None => {
                    tracing::warn!(%tag, "checkout tag is not a release tag; assuming 0.0.0");
                    Version::MIN
                }
            },
            Ok(None) => Version::MIN,
            Err(err) => {
                tracing::error!(error = %err, "failed to read current version");
                Version::MIN
            }
        }
    }

    fn embedded(&self) -> Option<Version> {
        let contents = match std::fs::read_to_string(&self.version_file) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::debug!(
                    path = %self.version_file.display(),
                    error = %err,
                    "version file unreadable"
                );
                return None;
            }
        };
        let captured = self.pattern.captures(&contents)?.get(1)?.as_str();
        match Version::parse(captured) {
            Ok(version) => Some(version),
            Err(err) => {
                tracing::warn!(error = %err, "embedded version is malformed");
                None
            }
        }
    }

    /// Newest published version on the resolved remote.
    ///
    /// Fetch or listing failures and the absence of release tags are soft
    /// failures. Only an unresolvable remote (no remotes at all) is an error.
    pub fn remote(
        &self,
        vcs: &dyn Vcs,
        resolver: &mut RemoteResolver,
    ) -> Result<StepOutcome<Version>, VcsError> {
        let remote = resolver.resolve_remote(vcs)?;

        if let Err(err) = vcs.fetch_tags(&remote) {
            let reason = if err.is_timeout() {
                format!("fetching tags from '{remote}' timed out; no connection or slow link")
            } else {
                format!("fetching tags from '{remote}' failed: {err}")
            };
            tracing::warn!("{reason}");
            return Ok(StepOutcome::soft(reason));
        }

        let tags = match vcs.tags(&self.tag_prefix) {
            Ok(tags) => tags,
            Err(err) => {
                let reason = format!("listing release tags failed: {err}");
                tracing::warn!("{reason}");
                return Ok(StepOutcome::soft(reason));
            }
        };

        let newest = tags
            .iter()
            .filter_map(|tag| {
                let parsed = tag.version(&self.tag_prefix);
                if parsed.is_none() {
                    tracing::debug!(%tag, "ignoring malformed release tag");
                }
                parsed
            })
            .max();

        match newest {
            Some(version) => Ok(StepOutcome::Success(version)),
            None => {
                let reason = format!("no release tags matching '{}*'", self.tag_prefix);
                tracing::warn!("{reason}");
                Ok(StepOutcome::soft(reason))
            }
        }
    }

    pub fn compare(current: &Version, remote: &Version) -> VersionComparison {
        VersionComparison::of(current, remote)
    }
}
