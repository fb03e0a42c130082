//! Job types and definitions for the colony scheduler
//!
//! A `Job` is one unit of assignable work. Its state, location and assigned
//! worker are owned by the `JobStore` indexes, so those fields can only be
//! changed from inside the jobs module; everything else is plain data.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::simulation::colonists::professions::Profession;
use crate::simulation::jobs::definitions::JobType;
use crate::simulation::resources::allocation::{HaulingAllocation, LiquidAllocation};
use crate::simulation::types::{EntityId, MaterialType, ResourceType, TileCoord};
use crate::simulation::workplaces::Recipe;

/// Unique identifier for a job instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job#{}", self.0)
    }
}

/// Where a job sits in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Someone capable can reach it; offered to requesting workers
    Assignable,
    /// Claimed by a worker
    Assigned,
    /// Waiting for the accessibility updater to confirm a capable worker can reach it
    PotentiallyAccessible,
    /// Nobody can currently reach it, retried periodically
    Inaccessible,
    /// Terminal; purged from every index
    Removed,
}

impl JobState {
    /// States that have a collection in the store
    pub fn live() -> &'static [JobState] {
        &[
            JobState::Assignable,
            JobState::Assigned,
            JobState::PotentiallyAccessible,
            JobState::Inaccessible,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Assignable => "Assignable",
            JobState::Assigned => "Assigned",
            JobState::PotentiallyAccessible => "PotentiallyAccessible",
            JobState::Inaccessible => "Inaccessible",
            JobState::Removed => "Removed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Job urgency. Lower sorts first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobPriority {
    Urgent,
    High,
    Normal,
    Low,
    /// Never offered to workers
    Disabled,
}

impl Default for JobPriority {
    fn default() -> Self {
        JobPriority::Normal
    }
}

impl JobPriority {
    pub fn all() -> &'static [JobPriority] {
        &[
            JobPriority::Urgent,
            JobPriority::High,
            JobPriority::Normal,
            JobPriority::Low,
            JobPriority::Disabled,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobPriority::Urgent => "Urgent",
            JobPriority::High => "High",
            JobPriority::Normal => "Normal",
            JobPriority::Low => "Low",
            JobPriority::Disabled => "Disabled",
        }
    }
}

/// A unit of assignable work
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub(in crate::simulation::jobs) id: JobId,
    /// Its name keys the store's type index
    pub(in crate::simulation::jobs) job_type: JobType,
    pub(in crate::simulation::jobs) state: JobState,
    /// Only `None` for malformed jobs, which are never spatially indexed
    pub(in crate::simulation::jobs) location: Option<TileCoord>,
    pub priority: JobPriority,
    pub(in crate::simulation::jobs) required_profession: Option<Profession>,
    pub required_resource_type: Option<ResourceType>,
    pub required_resource_material: Option<MaterialType>,
    pub(in crate::simulation::jobs) assigned_worker: Option<EntityId>,
    /// Entity the job acts upon (tree, plant, station, construction)
    pub target_entity: Option<EntityId>,
    pub(in crate::simulation::jobs) hauling_allocation: Option<HaulingAllocation>,
    pub liquid_allocation: Option<LiquidAllocation>,
    pub recipe: Option<Recipe>,
    /// Seconds of work once the worker is in place
    pub work_time: f32,
}

impl Job {
    /// Create a new job; state starts as PotentiallyAccessible until the factory
    /// or store decides otherwise
    pub fn new(id: JobId, job_type: JobType, location: Option<TileCoord>) -> Self {
        Job {
            id,
            required_profession: job_type.required_profession,
            work_time: job_type.work_time,
            job_type,
            state: JobState::PotentiallyAccessible,
            location,
            priority: JobPriority::default(),
            required_resource_type: None,
            required_resource_material: None,
            assigned_worker: None,
            target_entity: None,
            hauling_allocation: None,
            liquid_allocation: None,
            recipe: None,
        }
    }

    /// Override the profession the job type asks for
    pub fn with_profession(mut self, profession: Option<Profession>) -> Self {
        self.required_profession = profession;
        self
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_target(mut self, target: EntityId) -> Self {
        self.target_entity = Some(target);
        self
    }

    pub fn with_hauling_allocation(mut self, hauling: HaulingAllocation) -> Self {
        self.hauling_allocation = Some(hauling);
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn job_type(&self) -> &JobType {
        &self.job_type
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn location(&self) -> Option<TileCoord> {
        self.location
    }

    pub fn assigned_worker(&self) -> Option<EntityId> {
        self.assigned_worker
    }

    pub fn required_profession(&self) -> Option<Profession> {
        self.required_profession
    }

    pub fn hauling_allocation(&self) -> Option<&HaulingAllocation> {
        self.hauling_allocation.as_ref()
    }

    pub fn type_name(&self) -> &str {
        &self.job_type.name
    }

    /// Still offerable to workers at all?
    pub fn is_enabled(&self) -> bool {
        self.priority != JobPriority::Disabled
    }

    /// Squared distance from `from`, or `None` for unlocated jobs
    pub fn distance_squared_from(&self, from: &TileCoord) -> Option<i64> {
        self.location.map(|loc| loc.distance_squared(from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::jobs::definitions::{JobTypeDictionary, MINING};

    #[test]
    fn test_priority_order() {
        assert!(JobPriority::Urgent < JobPriority::High);
        assert!(JobPriority::High < JobPriority::Normal);
        assert!(JobPriority::Low < JobPriority::Disabled);
        assert_eq!(JobPriority::default(), JobPriority::Normal);
        assert_eq!(JobPriority::all().len(), 5);
    }

    #[test]
    fn test_new_job_copies_type_requirements() {
        let dictionary = JobTypeDictionary::builtin();
        let mining = dictionary.get(MINING).cloned().unwrap();
        let job = Job::new(JobId(7), mining, Some(TileCoord::new(3, 3)));

        assert_eq!(job.required_profession(), Some(Profession::Miner));
        assert_eq!(job.state(), JobState::PotentiallyAccessible);
        assert_eq!(job.assigned_worker(), None);
        assert_eq!(job.type_name(), MINING);
        assert_eq!(job.distance_squared_from(&TileCoord::new(0, 0)), Some(18));
        assert_eq!(format!("{}", job.id), "Job#7");
    }

    #[test]
    fn test_live_states_exclude_removed() {
        assert!(!JobState::live().contains(&JobState::Removed));
        assert_eq!(JobState::live().len(), 4);
    }
}
