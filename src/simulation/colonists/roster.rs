//! Worker collaborator seam
//!
//! The scheduler talks to worker behavior only through `WorkerBehaviors`.
//! `Roster` is the in-crate implementation used by the demo runner and tests.

use std::collections::BTreeMap;

use crate::simulation::colonists::professions::Profession;
use crate::simulation::colonists::types::{Colonist, ColonistActivityState};
use crate::simulation::jobs::types::JobId;
use crate::simulation::types::{EntityId, TileCoord};

/// Point-in-time view of a worker that can take jobs
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerSnapshot {
    pub id: EntityId,
    pub location: TileCoord,
    pub active_professions: Vec<Profession>,
}

/// What the scheduler needs from worker behavior
pub trait WorkerBehaviors {
    /// All workers currently able to take jobs
    fn assignable_workers(&self) -> Vec<WorkerSnapshot>;

    /// Does the worker's own behavior still consider `job` its current assignment?
    fn is_working_on(&self, worker: EntityId, job: JobId) -> bool;

    /// Abort whatever the worker is doing for its current job
    fn interrupt(&mut self, worker: EntityId);
}

/// All colonists, keyed by id
#[derive(Clone, Debug, Default)]
pub struct Roster {
    pub colonists: BTreeMap<EntityId, Colonist>,
}

impl Roster {
    pub fn new() -> Self {
        Roster {
            colonists: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, colonist: Colonist) {
        self.colonists.insert(colonist.id, colonist);
    }

    pub fn get(&self, id: EntityId) -> Option<&Colonist> {
        self.colonists.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Colonist> {
        self.colonists.get_mut(&id)
    }

    /// Remove a colonist from the world entirely
    pub fn destroy(&mut self, id: EntityId) -> Option<Colonist> {
        self.colonists.remove(&id)
    }

    /// Ids of colonists with nothing to do
    pub fn idle_colonists(&self) -> Vec<EntityId> {
        self.colonists
            .values()
            .filter(|c| c.is_idle())
            .map(|c| c.id)
            .collect()
    }

    /// Workers still walking or working count as busy for reporting
    pub fn busy_count(&self) -> usize {
        self.colonists
            .values()
            .filter(|c| {
                matches!(
                    c.activity_state,
                    ColonistActivityState::Traveling | ColonistActivityState::Working
                )
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.colonists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colonists.is_empty()
    }
}

impl WorkerBehaviors for Roster {
    fn assignable_workers(&self) -> Vec<WorkerSnapshot> {
        self.colonists
            .values()
            .filter(|c| c.can_work())
            .map(|c| WorkerSnapshot {
                id: c.id,
                location: c.location,
                active_professions: c.active_professions.clone(),
            })
            .collect()
    }

    fn is_working_on(&self, worker: EntityId, job: JobId) -> bool {
        self.colonists
            .get(&worker)
            .map_or(false, |c| c.is_alive && c.current_job == Some(job))
    }

    fn interrupt(&mut self, worker: EntityId) {
        if let Some(colonist) = self.colonists.get_mut(&worker) {
            colonist.clear_job();
            colonist.interrupted = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        let mut roster = Roster::new();
        roster.add(Colonist::new(EntityId(1), "Ada", TileCoord::new(0, 0), &[Profession::Miner]));
        roster.add(Colonist::new(EntityId(2), "Bo", TileCoord::new(1, 0), &[]));
        roster
    }

    #[test]
    fn test_assignable_workers_skips_dead() {
        let mut roster = roster();
        roster.get_mut(EntityId(2)).unwrap().is_alive = false;
        let workers = roster.assignable_workers();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].id, EntityId(1));
    }

    #[test]
    fn test_is_working_on() {
        let mut roster = roster();
        roster.get_mut(EntityId(1)).unwrap().current_job = Some(JobId(7));
        assert!(roster.is_working_on(EntityId(1), JobId(7)));
        assert!(!roster.is_working_on(EntityId(1), JobId(8)));
        assert!(!roster.is_working_on(EntityId(99), JobId(7)));
    }

    #[test]
    fn test_interrupt_clears_job() {
        let mut roster = roster();
        let c = roster.get_mut(EntityId(1)).unwrap();
        c.current_job = Some(JobId(7));
        c.activity_state = ColonistActivityState::Working;

        roster.interrupt(EntityId(1));
        let c = roster.get(EntityId(1)).unwrap();
        assert!(c.interrupted);
        assert!(c.current_job.is_none());
        assert_eq!(roster.busy_count(), 0);
    }
}
