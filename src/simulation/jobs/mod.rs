//! Job system - scheduling colony work
//!
//! Jobs are created from designations and resource requests, indexed by the
//! `JobStore`, promoted to assignable by the accessibility updater, offered to
//! idle workers by the request handler, and finished or cancelled through the
//! message handler.

pub mod types;
pub mod definitions;
pub mod collection;
pub mod store;
pub mod accessibility;
pub mod assignment;
pub mod factory;
pub mod processing;
pub mod messages;

pub use types::{Job, JobId, JobPriority, JobState};
pub use definitions::{JobType, JobTypeDictionary};
pub use collection::JobCollection;
pub use store::{JobStore, SweepOutcome};
pub use accessibility::{AccessibilityOutcome, AccessibilityReport, JobAccessibilityUpdater};
pub use assignment::{rank_jobs, JobCallback, JobRequest, JobRequestHandler, RequestId};
pub use factory::{Designation, DesignationTarget, JobFactory};
pub use processing::{CompletionContext, CompletionEffect, CompletionRegistry, FollowOn, JobEvent};
pub use messages::JobMessageHandler;
