//! upkeep core library: domain types, updater configuration, subprocess runner.
//!
//! Public API surface:
//! - [`types`]: versions, release tags, remote selection, step outcomes
//! - [`config`]: [`UpdaterConfig`] load / save
//! - [`process`]: bounded subprocess execution
//! - [`error`]: [`CoreError`], [`ProcessError`]

pub mod config;
pub mod error;
pub mod process;
pub mod types;

pub use config::{Timeouts, UpdaterConfig};
pub use error::{CoreError, ProcessError};
pub use types::{
    ReleaseTag, RemoteConfig, StepOutcome, Version, VersionComparison, VersionParseError,
};
