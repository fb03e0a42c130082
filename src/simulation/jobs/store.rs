//! The authoritative job registry
//!
//! `JobStore` owns every live job and keeps the secondary indexes (by state
//! and profession, by location, by type, by hauling allocation) in step.
//! State changes go through `switch_state`, `claim` and `remove` only.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, error, warn};

use crate::simulation::colonists::professions::Profession;
use crate::simulation::colonists::roster::WorkerBehaviors;
use crate::simulation::error::ClaimError;
use crate::simulation::jobs::collection::JobCollection;
use crate::simulation::jobs::types::{Job, JobId, JobState};
use crate::simulation::types::{AllocationId, EntityId, TileCoord};

/// What one step of the assigned-job sweep found
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Interval not elapsed, or nothing assigned
    Skipped,
    /// Index entry pointed at a job that no longer exists
    Purged(JobId),
    /// Assigned job had no worker recorded; back to assignable
    Unclaimed(JobId),
    /// Worker no longer working the job; back to assignable
    Orphaned { job: JobId, worker: EntityId },
    /// Assignment checked out
    Healthy(JobId),
}

#[derive(Clone, Debug)]
pub struct JobStore {
    jobs: BTreeMap<JobId, Job>,
    by_state: HashMap<JobState, JobCollection>,
    by_location: HashMap<TileCoord, Vec<JobId>>,
    by_type: HashMap<String, BTreeSet<JobId>>,
    by_hauling_id: HashMap<AllocationId, JobId>,
    sweep_interval: f32,
    sweep_timer: f32,
}

impl JobStore {
    pub fn new(sweep_interval: f32) -> Self {
        let by_state = JobState::live()
            .iter()
            .map(|&state| (state, JobCollection::new(state)))
            .collect();
        JobStore {
            jobs: BTreeMap::new(),
            by_state,
            by_location: HashMap::new(),
            by_type: HashMap::new(),
            by_hauling_id: HashMap::new(),
            sweep_interval,
            sweep_timer: 0.0,
        }
    }

    /// Take ownership of a job and index it.
    ///
    /// A job without a location is logged and kept out of the spatial index;
    /// it stays reachable by id, type and state only. A job whose id is
    /// already taken is logged and dropped, leaving the store untouched.
    pub fn add(&mut self, mut job: Job) -> Option<JobId> {
        let id = job.id;
        if self.jobs.contains_key(&id) {
            error!(
                job = %id,
                job_type = %job.job_type.name,
                "job id already in use, job not added"
            );
            return None;
        }
        if job.state == JobState::Removed {
            job.state = JobState::PotentiallyAccessible;
        }

        match job.location {
            Some(location) => self.by_location.entry(location).or_default().push(id),
            None => error!(
                job = %id,
                job_type = %job.job_type.name,
                "job added without a location"
            ),
        }
        if let Some(collection) = self.by_state.get_mut(&job.state) {
            collection.add(id, job.required_profession);
        }
        self.by_type
            .entry(job.job_type.name.clone())
            .or_default()
            .insert(id);
        if let Some(hauling) = &job.hauling_allocation {
            self.by_hauling_id.insert(hauling.id, id);
        }

        debug!(job = %id, job_type = %job.job_type.name, state = %job.state, "job added");
        self.jobs.insert(id, job);
        Some(id)
    }

    /// Purge a job from every index and hand it back so the caller can
    /// release its allocations.
    ///
    /// If the assigned worker still considers this its current job, the
    /// worker is interrupted. Removing an unknown job is a no-op.
    pub fn remove(&mut self, id: JobId, workers: &mut dyn WorkerBehaviors) -> Option<Job> {
        let mut job = self.jobs.remove(&id)?;

        self.unindex_state(&job);
        if let Some(location) = job.location {
            self.unindex_location(id, location);
        }
        let emptied = match self.by_type.get_mut(&job.job_type.name) {
            Some(ids) => {
                ids.remove(&id);
                ids.is_empty()
            }
            None => false,
        };
        if emptied {
            self.by_type.remove(&job.job_type.name);
        }
        if let Some(hauling) = &job.hauling_allocation {
            self.by_hauling_id.remove(&hauling.id);
        }

        if let Some(worker) = job.assigned_worker.take() {
            if workers.is_working_on(worker, id) {
                workers.interrupt(worker);
            }
        }
        job.state = JobState::Removed;

        debug!(job = %id, job_type = %job.job_type.name, "job removed");
        Some(job)
    }

    /// Move a job between state collections.
    ///
    /// No-op when the state is unchanged. `Removed` is only reachable through
    /// `remove`. Returns whether the job changed state.
    pub fn switch_state(&mut self, id: JobId, new_state: JobState) -> bool {
        if new_state == JobState::Removed {
            warn!(job = %id, "switch_state to Removed ignored; use remove");
            return false;
        }
        let Some(job) = self.jobs.get(&id) else {
            return false;
        };
        let old_state = job.state;
        if old_state == new_state {
            return false;
        }
        let profession = job.required_profession;

        if let Some(collection) = self.by_state.get_mut(&old_state) {
            if !collection.remove(id, profession) {
                collection.purge(id);
            }
        }
        if let Some(collection) = self.by_state.get_mut(&new_state) {
            collection.add(id, profession);
        }
        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = new_state;
        }
        true
    }

    /// Accept a worker's claim: `Assignable -> Assigned`
    pub fn claim(&mut self, id: JobId, worker: EntityId) -> Result<(), ClaimError> {
        let job = self.jobs.get(&id).ok_or(ClaimError::JobNotFound(id))?;
        if let Some(existing) = job.assigned_worker {
            return Err(ClaimError::AlreadyClaimed { worker: existing });
        }
        if job.state != JobState::Assignable {
            return Err(ClaimError::NotAssignable { state: job.state });
        }

        self.switch_state(id, JobState::Assigned);
        if let Some(job) = self.jobs.get_mut(&id) {
            job.assigned_worker = Some(worker);
        }
        debug!(job = %id, worker = %worker, "job claimed");
        Ok(())
    }

    /// Clear the assigned worker, returning who it was
    pub fn unassign(&mut self, id: JobId) -> Option<EntityId> {
        self.jobs.get_mut(&id)?.assigned_worker.take()
    }

    /// Move a job to a new tile, keeping the location index in step
    pub fn relocate(&mut self, id: JobId, location: TileCoord) -> bool {
        let Some(old) = self.jobs.get(&id).map(|j| j.location) else {
            return false;
        };
        if old == Some(location) {
            return false;
        }
        if let Some(old) = old {
            self.unindex_location(id, old);
        }
        self.by_location.entry(location).or_default().push(id);
        if let Some(job) = self.jobs.get_mut(&id) {
            job.location = Some(location);
        }
        true
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Mutable access for payload fields. Id, type, state, location, profession,
    /// worker and hauling allocation are only changed through the store.
    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.get_mut(&id)
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Jobs indexed at a tile; empty when there are none
    pub fn jobs_at_location(&self, location: TileCoord) -> &[JobId] {
        self.by_location
            .get(&location)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Snapshot of job ids of one type
    pub fn jobs_of_type(&self, job_type: &str) -> Vec<JobId> {
        self.by_type
            .get(job_type)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn job_for_hauling(&self, allocation: AllocationId) -> Option<JobId> {
        self.by_hauling_id.get(&allocation).copied()
    }

    pub fn collection(&self, state: JobState) -> Option<&JobCollection> {
        self.by_state.get(&state)
    }

    pub fn count_in_state(&self, state: JobState) -> usize {
        self.by_state.get(&state).map_or(0, |c| c.len())
    }

    /// Advance the round-robin cursor of one state collection
    pub fn next_in_state(&mut self, state: JobState) -> Option<JobId> {
        self.by_state.get_mut(&state)?.next()
    }

    /// Assignable jobs filed under exactly this requirement
    pub fn assignable_with(&self, profession: Option<Profession>) -> Vec<JobId> {
        self.by_state
            .get(&JobState::Assignable)
            .map(|c| c.with_profession(profession).collect())
            .unwrap_or_default()
    }

    /// Periodic consistency sweep over assigned jobs, one per interval
    pub fn update(&mut self, delta: f32, workers: &dyn WorkerBehaviors) -> SweepOutcome {
        self.sweep_timer += delta;
        if self.sweep_timer < self.sweep_interval {
            return SweepOutcome::Skipped;
        }
        // Carry the remainder, owing at most one sweep
        self.sweep_timer = (self.sweep_timer - self.sweep_interval).min(self.sweep_interval);

        let Some(id) = self.next_in_state(JobState::Assigned) else {
            return SweepOutcome::Skipped;
        };
        let Some(job) = self.jobs.get(&id) else {
            if let Some(collection) = self.by_state.get_mut(&JobState::Assigned) {
                collection.purge(id);
            }
            return SweepOutcome::Purged(id);
        };

        let assigned = job.assigned_worker;
        match assigned {
            None => {
                self.switch_state(id, JobState::Assignable);
                SweepOutcome::Unclaimed(id)
            }
            Some(worker) if !workers.is_working_on(worker, id) => {
                warn!(
                    job = %id,
                    worker = %worker,
                    "orphaned assignment, job returned to assignable"
                );
                self.unassign(id);
                self.switch_state(id, JobState::Assignable);
                SweepOutcome::Orphaned { job: id, worker }
            }
            Some(_) => SweepOutcome::Healthy(id),
        }
    }

    /// Do the indexes agree with the jobs they index?
    pub fn is_consistent(&self) -> bool {
        let indexed: usize = self.by_state.values().map(|c| c.len()).sum();
        if indexed != self.jobs.len() {
            return false;
        }
        let jobs_indexed = self.jobs.values().all(|job| {
            let in_state = self
                .by_state
                .get(&job.state)
                .map_or(false, |c| c.contains(job.id));
            let in_location = match job.location {
                Some(location) => self.jobs_at_location(location).contains(&job.id),
                None => true,
            };
            let in_hauling = match &job.hauling_allocation {
                Some(hauling) => self.by_hauling_id.get(&hauling.id) == Some(&job.id),
                None => true,
            };
            in_state && in_location && in_hauling
        });
        if !jobs_indexed {
            return false;
        }

        // No index entry may outlive its job or point at it under a stale key
        let locations = self.by_location.iter().all(|(location, ids)| {
            ids.iter()
                .all(|id| self.jobs.get(id).map_or(false, |job| job.location == Some(*location)))
        });
        let types = self.by_type.iter().all(|(name, ids)| {
            ids.iter()
                .all(|id| self.jobs.get(id).map_or(false, |job| job.job_type.name == *name))
        });
        let hauls = self.by_hauling_id.iter().all(|(allocation, id)| {
            self.jobs
                .get(id)
                .and_then(|job| job.hauling_allocation.as_ref())
                .map_or(false, |hauling| hauling.id == *allocation)
        });
        locations && types && hauls
    }

    fn unindex_state(&mut self, job: &Job) {
        if let Some(collection) = self.by_state.get_mut(&job.state) {
            if !collection.remove(job.id, job.required_profession) {
                collection.purge(job.id);
            }
        }
    }

    fn unindex_location(&mut self, id: JobId, location: TileCoord) {
        let emptied = match self.by_location.get_mut(&location) {
            Some(ids) => {
                ids.retain(|&j| j != id);
                ids.is_empty()
            }
            None => false,
        };
        if emptied {
            self.by_location.remove(&location);
        }
    }
}
