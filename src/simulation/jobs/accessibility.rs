//! Incremental reachability evaluation
//!
//! Each tick the updater looks at one potentially accessible job and decides
//! whether a capable worker can get to it, using region-id equality between
//! the worker's tile and one of the job's entry tiles. On a slower timer it
//! also moves one inaccessible job back for another look, in case the map
//! has changed.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::simulation::colonists::professions::satisfies;
use crate::simulation::colonists::roster::WorkerBehaviors;
use crate::simulation::jobs::definitions::JobType;
use crate::simulation::jobs::store::JobStore;
use crate::simulation::jobs::types::{JobId, JobState};
use crate::simulation::map::{TileMap, NO_REGION};
use crate::simulation::types::{EntityId, TileCoord};

/// Result of evaluating one potentially accessible job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessibilityOutcome {
    /// No potentially accessible jobs
    Idle,
    /// Nobody can do the job yet; left where it is
    Deferred(JobId),
    Assignable { job: JobId, worker: EntityId },
    Inaccessible(JobId),
}

/// What one updater tick did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessibilityReport {
    /// Inaccessible job moved back for re-evaluation, if the retry timer fired
    pub retried: Option<JobId>,
    pub outcome: AccessibilityOutcome,
}

/// Tiles a worker could stand on to do a job at `location`
pub fn entry_tiles(map: &dyn TileMap, job_type: &JobType, location: TileCoord) -> Vec<TileCoord> {
    if job_type.accessed_from_adjacent_tile {
        map.orthogonal_neighbours(location)
            .into_iter()
            .filter(|n| map.is_navigable(*n))
            .collect()
    } else {
        vec![location]
    }
}

/// One-off check used when a job is created
pub fn initial_state(
    map: &dyn TileMap,
    job_type: &JobType,
    location: Option<TileCoord>,
) -> JobState {
    let Some(location) = location else {
        return JobState::Inaccessible;
    };
    let reachable = entry_tiles(map, job_type, location)
        .into_iter()
        .any(|tile| map.is_navigable(tile));
    if reachable {
        JobState::PotentiallyAccessible
    } else {
        JobState::Inaccessible
    }
}

#[derive(Clone, Debug)]
pub struct JobAccessibilityUpdater {
    retry_interval: f32,
    retry_timer: f32,
}

impl JobAccessibilityUpdater {
    pub fn new(retry_interval: f32) -> Self {
        JobAccessibilityUpdater {
            retry_interval,
            retry_timer: 0.0,
        }
    }

    pub fn update<R: Rng>(
        &mut self,
        delta: f32,
        store: &mut JobStore,
        map: &dyn TileMap,
        workers: &dyn WorkerBehaviors,
        rng: &mut R,
    ) -> AccessibilityReport {
        let retried = self.retry_inaccessible(delta, store);
        let outcome = self.evaluate_next(store, map, workers, rng);
        AccessibilityReport { retried, outcome }
    }

    fn retry_inaccessible(&mut self, delta: f32, store: &mut JobStore) -> Option<JobId> {
        self.retry_timer += delta;
        if self.retry_timer < self.retry_interval {
            return None;
        }
        self.retry_timer = (self.retry_timer - self.retry_interval).min(self.retry_interval);

        let id = store.next_in_state(JobState::Inaccessible)?;
        store.switch_state(id, JobState::PotentiallyAccessible);
        Some(id)
    }

    fn evaluate_next<R: Rng>(
        &mut self,
        store: &mut JobStore,
        map: &dyn TileMap,
        workers: &dyn WorkerBehaviors,
        rng: &mut R,
    ) -> AccessibilityOutcome {
        let Some(id) = store.next_in_state(JobState::PotentiallyAccessible) else {
            return AccessibilityOutcome::Idle;
        };
        let Some(job) = store.get(id) else {
            return AccessibilityOutcome::Idle;
        };
        let Some(location) = job.location() else {
            store.switch_state(id, JobState::Inaccessible);
            return AccessibilityOutcome::Inaccessible(id);
        };

        let required = job.required_profession();
        let candidates: Vec<_> = workers
            .assignable_workers()
            .into_iter()
            .filter(|w| satisfies(&w.active_professions, required))
            .collect();
        let Some(worker) = candidates.choose(rng) else {
            return AccessibilityOutcome::Deferred(id);
        };

        let mut entries = entry_tiles(map, &job.job_type, location);
        if entries.is_empty() {
            store.switch_state(id, JobState::Inaccessible);
            return AccessibilityOutcome::Inaccessible(id);
        }
        entries.shuffle(rng);
        let entry = entries[rng.gen_range(0..entries.len())];

        let worker_region = map.region_id(worker.location);
        let reachable = matches!(worker_region, Some(region) if region != NO_REGION)
            && worker_region == map.region_id(entry);
        if reachable {
            store.switch_state(id, JobState::Assignable);
            AccessibilityOutcome::Assignable { job: id, worker: worker.id }
        } else {
            store.switch_state(id, JobState::Inaccessible);
            AccessibilityOutcome::Inaccessible(id)
        }
    }
}
