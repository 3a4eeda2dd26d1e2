//! Domain types for the updater.
//!
//! [`Version`] is the only type with real ordering semantics; everything else is
//! a thin carrier passed between the resolver, synchronizer and orchestrator.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// A `major.minor.patch` release version.
///
/// Field order matters: the derived `Ord` compares lexicographically by
/// `(major, minor, patch)`, so `0.2.10 > 0.2.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// Why a version string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("version '{0}' must have exactly three dot-separated segments")]
    SegmentCount(String),

    #[error("version '{input}' has a non-numeric segment '{segment}'")]
    NonNumeric { input: String, segment: String },
}

impl Version {
    /// `0.0.0`, the value every malformed version collapses to.
    pub const MIN: Version = Version::new(0, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a strict `major.minor.patch` triple. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        let segments: Vec<&str> = trimmed.split('.').collect();
        if segments.len() != 3 {
            return Err(VersionParseError::SegmentCount(trimmed.to_string()));
        }

        let mut parts = [0u64; 3];
        for (slot, segment) in parts.iter_mut().zip(&segments) {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionParseError::NonNumeric {
                    input: trimmed.to_string(),
                    segment: (*segment).to_string(),
                });
            }
            *slot = segment
                .parse()
                .map_err(|_| VersionParseError::NonNumeric {
                    input: trimmed.to_string(),
                    segment: (*segment).to_string(),
                })?;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    /// Parse, treating anything malformed as [`Version::MIN`].
    pub fn parse_or_min(input: &str) -> Self {
        Self::parse(input).unwrap_or(Self::MIN)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Relationship between the installed version and the newest published one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComparison {
    NewerAvailable,
    UpToDate,
    LocalAhead,
}

impl VersionComparison {
    pub fn of(current: &Version, remote: &Version) -> Self {
        match remote.cmp(current) {
            Ordering::Greater => VersionComparison::NewerAvailable,
            Ordering::Equal => VersionComparison::UpToDate,
            Ordering::Less => VersionComparison::LocalAhead,
        }
    }
}

impl fmt::Display for VersionComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionComparison::NewerAvailable => write!(f, "newer available"),
            VersionComparison::UpToDate => write!(f, "up to date"),
            VersionComparison::LocalAhead => write!(f, "local ahead"),
        }
    }
}

// ---------------------------------------------------------------------------
// Release tags
// ---------------------------------------------------------------------------

/// A version-control tag naming an immutable published release, e.g. `v0.2.3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseTag(pub String);

impl ReleaseTag {
    /// Tag name for `version` under the `prefix` convention.
    pub fn for_version(prefix: &str, version: &Version) -> Self {
        Self(format!("{prefix}{version}"))
    }

    /// Version encoded in this tag, or `None` if the prefix does not match or
    /// the remainder is not a strict triple.
    pub fn version(&self, prefix: &str) -> Option<Version> {
        self.0
            .strip_prefix(prefix)
            .and_then(|rest| Version::parse(rest).ok())
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ReleaseTag {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ReleaseTag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Remote selection
// ---------------------------------------------------------------------------

/// The remote/branch pair a session operates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub remote: String,
    pub branch: String,
}

impl RemoteConfig {
    /// `remote/branch`, as used in remote-tracking refs.
    pub fn tracking_ref(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }
}

impl fmt::Display for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.remote, self.branch)
    }
}

// ---------------------------------------------------------------------------
// Step outcome
// ---------------------------------------------------------------------------

/// Result of a step that may succeed, succeed in a degraded way, or softly fail.
///
/// Hard failures are carried by the surrounding `Result`; a `SoftFailure` is
/// never an error and never a success.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum StepOutcome<T> {
    Success(T),
    Degraded { value: T, warning: String },
    SoftFailure { reason: String },
}

impl<T> StepOutcome<T> {
    pub fn soft(reason: impl Into<String>) -> Self {
        StepOutcome::SoftFailure {
            reason: reason.into(),
        }
    }

    pub fn degraded(value: T, warning: impl Into<String>) -> Self {
        StepOutcome::Degraded {
            value,
            warning: warning.into(),
        }
    }

    /// The carried value for `Success` and `Degraded`.
    pub fn value(self) -> Option<T> {
        match self {
            StepOutcome::Success(value) | StepOutcome::Degraded { value, .. } => Some(value),
            StepOutcome::SoftFailure { .. } => None,
        }
    }

    pub fn is_soft_failure(&self) -> bool {
        matches!(self, StepOutcome::SoftFailure { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StepOutcome<U> {
        match self {
            StepOutcome::Success(value) => StepOutcome::Success(f(value)),
            StepOutcome::Degraded { value, warning } => StepOutcome::Degraded {
                value: f(value),
                warning,
            },
            StepOutcome::SoftFailure { reason } => StepOutcome::SoftFailure { reason },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
