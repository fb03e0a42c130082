//! Colonist types and structures
//!
//! Colonists are the workers the scheduler hands jobs to. Their own goal
//! logic lives outside the scheduler; this is the minimal state the
//! scheduler consults through `WorkerBehaviors`.

use serde::{Deserialize, Serialize};

use crate::simulation::colonists::professions::Profession;
use crate::simulation::jobs::types::JobId;
use crate::simulation::types::{EntityId, TileCoord};

/// Activity state for a colonist (what they're currently doing)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColonistActivityState {
    /// No current task
    Idle,
    /// Asked the scheduler for work, waiting on the answer
    AwaitingWork,
    /// Walking to the job
    Traveling,
    /// At the job, performing it
    Working,
}

impl Default for ColonistActivityState {
    fn default() -> Self {
        ColonistActivityState::Idle
    }
}

/// A worker in the colony
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Colonist {
    pub id: EntityId,
    pub name: String,
    /// Current location on the map
    pub location: TileCoord,
    /// Professions the colonist is currently willing to work as, most preferred first
    pub active_professions: Vec<Profession>,
    /// Job the colonist is currently assigned to
    pub current_job: Option<JobId>,
    /// What the colonist is currently doing
    pub activity_state: ColonistActivityState,
    /// Seconds of work left on the current job
    pub work_remaining: f32,
    /// Set when the scheduler pulled the current job out from under the colonist
    pub interrupted: bool,
    pub is_alive: bool,
}

impl Colonist {
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        location: TileCoord,
        professions: &[Profession],
    ) -> Self {
        Colonist {
            id,
            name: name.into(),
            location,
            active_professions: professions.to_vec(),
            current_job: None,
            activity_state: ColonistActivityState::Idle,
            work_remaining: 0.0,
            interrupted: false,
            is_alive: true,
        }
    }

    /// Can this colonist take jobs at all?
    pub fn can_work(&self) -> bool {
        self.is_alive
    }

    pub fn is_idle(&self) -> bool {
        self.is_alive
            && self.activity_state == ColonistActivityState::Idle
            && self.current_job.is_none()
    }

    /// Drop the current job and go back to idling
    pub fn clear_job(&mut self) {
        self.current_job = None;
        self.activity_state = ColonistActivityState::Idle;
        self.work_remaining = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_colonist_is_idle() {
        let c = Colonist::new(EntityId(1), "Urist", TileCoord::new(0, 0), &[Profession::Miner]);
        assert!(c.is_idle());
        assert!(c.can_work());
        assert_eq!(c.active_professions, vec![Profession::Miner]);
    }

    #[test]
    fn test_clear_job() {
        let mut c = Colonist::new(EntityId(1), "Urist", TileCoord::new(0, 0), &[]);
        c.current_job = Some(JobId(4));
        c.activity_state = ColonistActivityState::Working;
        c.clear_job();
        assert!(c.is_idle());
    }
}
