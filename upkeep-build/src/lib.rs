//! # upkeep-build
//!
//! Everything that touches the build-output directory:
//!
//! - [`backup`]: snapshot / restore / list
//! - [`builder`]: change-gated external build with a deadline
//! - [`validate`]: artifact smoke check
//! - [`package`]: portable archive of the build output

pub mod backup;
pub mod builder;
pub mod error;
pub mod package;
mod tree;
pub mod validate;

pub use backup::{Backup, BackupManager, SnapshotManifest};
pub use builder::{Builder, RebuildOutcome};
pub use error::BuildError;
pub use package::PackageSummary;
