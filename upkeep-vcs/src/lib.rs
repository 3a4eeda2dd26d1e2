//! # upkeep-vcs
//!
//! Everything the updater asks of version control.
//!
//! The [`Vcs`] trait is the seam: [`GitCli`] drives the `git` binary with
//! bounded subprocess calls, and the `testing` feature adds a scripted
//! in-memory implementation. On top of it sit the resolvers and policies:
//!
//! - [`resolver::RemoteResolver`]: remote/branch selection with fallbacks
//! - [`version::VersionResolver`]: installed vs. newest published version
//! - [`change::changed`]: fail-open rebuild gate
//! - [`sync::sync_to_tag`]: exact-tag synchronization with a degraded pull

pub mod change;
pub mod error;
pub mod git;
pub mod resolver;
pub mod sync;
pub mod version;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

pub use error::VcsError;
pub use git::{GitCli, Vcs};
pub use resolver::RemoteResolver;
pub use sync::SyncTarget;
pub use version::VersionResolver;
