//! Colony job scheduling
//!
//! Tracks every unit of colony work from creation to completion: jobs are
//! created from designations and resource requests, checked for
//! reachability, offered to idle workers ranked by distance and priority,
//! and cleaned up when they finish, get cancelled or lose their target.
//!
//! # Module Structure
//!
//! - `types`: ids, tile coordinates, materials and resources
//! - `params`: scheduler tuning parameters
//! - `error`: error types shared by the scheduler
//! - `map`: the tile map interface and a grid implementation
//! - `colonists`: workers, professions and the roster
//! - `resources`: items, liquids, stockpiles and allocations
//! - `workplaces`: crafting stations and recipes
//! - `structures`: constructions waiting for materials
//! - `world`: everything jobs can point at, in one place
//! - `jobs`: the scheduler components
//! - `activity_log`: bounded history of job lifecycle events
//! - `simulation`: the scheduler facade and a small demo colony
//!
//! # Usage
//!
//! ```ignore
//! use colony_jobs::simulation::{run_simulation, ColonyConfig, JobTypeDictionary, SchedulerParams};
//!
//! let colony = run_simulation(
//!     &ColonyConfig::default(),
//!     SchedulerParams::default(),
//!     JobTypeDictionary::builtin(),
//!     500,
//!     &mut rng,
//! );
//! ```

pub mod types;
pub mod params;
pub mod error;
pub mod map;
pub mod colonists;
pub mod resources;
pub mod workplaces;
pub mod structures;
pub mod world;
pub mod jobs;
pub mod activity_log;
pub mod simulation;

// Re-export main types for convenience
pub use types::{
    AllocationId, EntityId, IdGenerator, LiquidType, MaterialType, ResourceType, TileCoord,
};
pub use params::SchedulerParams;
pub use error::{AllocationError, ClaimError, CompletionError, ConfigError, JobCreationError};
pub use map::{GridMap, TileMap, Wall, NO_REGION};
pub use colonists::{
    Colonist, ColonistActivityState, Profession, Roster, WorkerBehaviors, WorkerSnapshot,
};
pub use resources::{Item, ItemRegistry, LiquidContainer, LiquidRegistry, Stockpile};
pub use workplaces::{CraftingStation, Recipe, WorkplaceType};
pub use structures::{Construction, StructureType};
pub use world::{HaulingDestination, Plant, PlantKind, World};
pub use jobs::{
    Designation, DesignationTarget, Job, JobEvent, JobId, JobPriority, JobState, JobStore,
    JobType, JobTypeDictionary,
};
pub use activity_log::{ActivityCategory, ActivityEntry, ActivityLog, ActivityStats};
pub use simulation::{
    run_simulation, Colony, ColonyConfig, ColonyStats, ColonySummary, JobSystem, TickReport,
};
