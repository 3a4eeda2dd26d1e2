//! # upkeep-session
//!
//! One update session, end to end: the stage machine in [`orchestrator`],
//! the [`Pipeline`] seam it drives, the real [`Installation`] behind that
//! seam, plus process-wide [`logging`] and the [`SessionLock`].

pub mod error;
pub mod lock;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;

pub use error::UpdateError;
pub use lock::SessionLock;
pub use orchestrator::{
    Availability, Orchestrator, Rollback, SessionOutcome, Stage, UpdateOptions, UpdateSession,
};
pub use pipeline::{Installation, Pipeline};
