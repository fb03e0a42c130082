//! Colonist system - the workers jobs are assigned to
//!
//! Each colonist carries the professions it is willing to work, its current
//! job and what it is doing about it. The `Roster` answers the scheduler's
//! questions about workers through `WorkerBehaviors`.

pub mod professions;
pub mod types;
pub mod roster;

pub use professions::{satisfies, Profession};
pub use types::{Colonist, ColonistActivityState};
pub use roster::{Roster, WorkerBehaviors, WorkerSnapshot};
