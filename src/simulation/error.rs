//! Error types for the job scheduler
//!
//! Most scheduler failures are soft (logged and healed on a later sweep);
//! these enums cover the places where a caller has to react.

use thiserror::Error;

use crate::simulation::jobs::types::{JobId, JobState};
use crate::simulation::types::EntityId;

/// Reasons an allocation could not be created. The resource is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    #[error("insufficient quantity: requested {requested}, {available} unallocated")]
    Insufficient { requested: u32, available: u32 },

    #[error("insufficient liquid: requested {requested}, {available} unallocated")]
    InsufficientLiquid { requested: f32, available: f32 },

    #[error("unknown resource {0}")]
    UnknownResource(EntityId),

    #[error("container {0} holds a different liquid")]
    LiquidMismatch(EntityId),

    #[error("allocation quantity must be positive and finite")]
    EmptyRequest,

    #[error("target {0} cannot accept the resource")]
    TargetRefused(EntityId),

    #[error("hauling target does not exist")]
    MissingTarget,
}

/// Reasons a worker's claim on a job was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("job is {state:?}, not assignable")]
    NotAssignable { state: JobState },

    #[error("job already claimed by {worker}")]
    AlreadyClaimed { worker: EntityId },
}

/// Reasons the factory produced no job. Nothing is left reserved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobCreationError {
    #[error("unknown job type {0}")]
    UnknownJobType(String),

    #[error("target {0} does not exist")]
    MissingTarget(EntityId),

    #[error("designation target has no location")]
    NoLocation,

    #[error("job id {0} is already in use")]
    DuplicateId(JobId),

    #[error("allocation failed: {0}")]
    Allocation(#[from] AllocationError),
}

/// Failures raised by a completion effect
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("no completion effect registered for job type {0}")]
    UnknownJobType(String),

    #[error("job {0} has no allocation to act on")]
    MissingAllocation(JobId),

    #[error("target of job {0} no longer exists")]
    MissingTarget(JobId),
}

/// Failures while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
