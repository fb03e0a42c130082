//! Job request handling
//!
//! Idle workers ask "what should I work on" through `JobRequestHandler::request`.
//! Requests queue up FIFO and a bounded batch is answered each tick with a
//! ranked list of assignable jobs: most urgent priority first, nearest first
//! within a priority. The handler never claims anything; the worker tries the
//! list in order and falls back when a claim is refused.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use tracing::debug;

use crate::simulation::colonists::professions::Profession;
use crate::simulation::jobs::store::JobStore;
use crate::simulation::jobs::types::{JobId, JobPriority};
use crate::simulation::types::{EntityId, TileCoord};

/// Handle for a queued request, used to cancel it
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// Receives the ranked job list for a request
pub type JobCallback = Box<dyn FnOnce(Vec<JobId>)>;

/// A worker asking for work
pub struct JobRequest {
    pub id: RequestId,
    pub requester: EntityId,
    pub location: TileCoord,
    pub professions: Vec<Profession>,
    callback: JobCallback,
}

impl fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRequest")
            .field("id", &self.id)
            .field("requester", &self.requester)
            .field("location", &self.location)
            .field("professions", &self.professions)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct JobRequestHandler {
    queue: VecDeque<JobRequest>,
    cancelled: HashSet<RequestId>,
    next_request: u64,
    min_per_tick: usize,
}

impl JobRequestHandler {
    pub fn new(min_per_tick: usize) -> Self {
        JobRequestHandler {
            queue: VecDeque::new(),
            cancelled: HashSet::new(),
            next_request: 1,
            min_per_tick: min_per_tick.max(1),
        }
    }

    /// Queue a request; `callback` runs once, on the tick it is answered
    pub fn request(
        &mut self,
        requester: EntityId,
        location: TileCoord,
        professions: &[Profession],
        callback: impl FnOnce(Vec<JobId>) + 'static,
    ) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        self.queue.push_back(JobRequest {
            id,
            requester,
            location,
            professions: professions.to_vec(),
            callback: Box::new(callback),
        });
        id
    }

    /// Drop a queued request; its callback never runs
    pub fn cancel(&mut self, id: RequestId) -> bool {
        if self.queue.iter().any(|r| r.id == id) {
            self.cancelled.insert(id)
        } else {
            false
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// How many requests the next `update` will take off the queue
    pub fn batch_size(&self) -> usize {
        let queued = self.queue.len();
        self.min_per_tick.max(queued / 2).min(queued)
    }

    /// Answer one batch of requests. Returns how many callbacks ran.
    pub fn update(&mut self, store: &JobStore) -> usize {
        let mut answered = 0;
        for _ in 0..self.batch_size() {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            if self.cancelled.remove(&request.id) {
                continue;
            }
            let ranked = rank_jobs(store, request.location, &request.professions);
            debug!(
                requester = %request.requester,
                offered = ranked.len(),
                "answered job request"
            );
            (request.callback)(ranked);
            answered += 1;
        }
        answered
    }
}

/// Assignable, unclaimed, enabled jobs a worker with `professions` could take,
/// most urgent first and nearest first within a priority
pub fn rank_jobs(store: &JobStore, from: TileCoord, professions: &[Profession]) -> Vec<JobId> {
    let mut seen = HashSet::new();
    let mut buckets: BTreeMap<JobPriority, Vec<(i64, JobId)>> = BTreeMap::new();

    let requirements = professions.iter().copied().map(Some).chain(std::iter::once(None));
    for requirement in requirements {
        for id in store.assignable_with(requirement) {
            if !seen.insert(id) {
                continue;
            }
            let Some(job) = store.get(id) else {
                continue;
            };
            if job.assigned_worker().is_some() || !job.is_enabled() {
                continue;
            }
            let Some(distance) = job.distance_squared_from(&from) else {
                continue;
            };
            buckets.entry(job.priority).or_default().push((distance, id));
        }
    }

    buckets
        .into_values()
        .flat_map(|mut bucket| {
            bucket.sort_by_key(|(distance, _)| *distance);
            bucket.into_iter().map(|(_, id)| id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::jobs::definitions::{JobTypeDictionary, HARVEST, MINING, TEND};
    use crate::simulation::jobs::types::{Job, JobState};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn assignable(
        store: &mut JobStore,
        id: u64,
        job_type: &str,
        at: TileCoord,
        priority: JobPriority,
    ) {
        let dictionary = JobTypeDictionary::builtin();
        let job = Job::new(JobId(id), dictionary.get(job_type).cloned().unwrap(), Some(at))
            .with_priority(priority);
        store.add(job);
        store.switch_state(JobId(id), JobState::Assignable);
    }

    #[test]
    fn test_rank_by_priority_then_distance() {
        let mut store = JobStore::new(0.0);
        let origin = TileCoord::new(0, 0);
        assignable(&mut store, 1, MINING, TileCoord::new(1, 0), JobPriority::Normal);
        assignable(&mut store, 2, MINING, TileCoord::new(9, 9), JobPriority::Urgent);
        assignable(&mut store, 3, HARVEST, TileCoord::new(2, 2), JobPriority::Urgent);
        assignable(&mut store, 4, MINING, TileCoord::new(5, 0), JobPriority::Normal);

        let ranked = rank_jobs(&store, origin, &[Profession::Miner, Profession::Farmer]);
        assert_eq!(ranked, vec![JobId(3), JobId(2), JobId(1), JobId(4)]);
    }

    #[test]
    fn test_rank_filters_profession_disabled_and_claimed() {
        let mut store = JobStore::new(0.0);
        let origin = TileCoord::new(0, 0);
        assignable(&mut store, 1, MINING, TileCoord::new(1, 0), JobPriority::Normal);
        assignable(&mut store, 2, HARVEST, TileCoord::new(1, 1), JobPriority::Normal);
        assignable(&mut store, 3, MINING, TileCoord::new(2, 0), JobPriority::Disabled);
        assignable(&mut store, 4, TEND, TileCoord::new(3, 0), JobPriority::Low);
        assignable(&mut store, 5, MINING, TileCoord::new(4, 0), JobPriority::Normal);
        store.claim(JobId(5), EntityId(77)).unwrap();

        // Anyone can tend; only miners get mining
        let ranked = rank_jobs(&store, origin, &[Profession::Miner]);
        assert_eq!(ranked, vec![JobId(1), JobId(4)]);
        assert_eq!(rank_jobs(&store, origin, &[]), vec![JobId(4)]);
    }

    #[test]
    fn test_batch_size_self_throttles() {
        let mut handler = JobRequestHandler::new(2);
        assert_eq!(handler.batch_size(), 0);
        for i in 0..10 {
            handler.request(EntityId(i), TileCoord::new(0, 0), &[], |_| {});
        }
        assert_eq!(handler.batch_size(), 5);

        let store = JobStore::new(0.0);
        assert_eq!(handler.update(&store), 5);
        assert_eq!(handler.pending(), 5);
        assert_eq!(handler.batch_size(), 2);

        let mut small = JobRequestHandler::new(2);
        small.request(EntityId(1), TileCoord::new(0, 0), &[], |_| {});
        assert_eq!(small.batch_size(), 1);
    }

    #[test]
    fn test_callbacks_receive_ranked_jobs_fifo() {
        let mut store = JobStore::new(0.0);
        assignable(&mut store, 1, TEND, TileCoord::new(2, 0), JobPriority::Normal);

        let answers = Rc::new(RefCell::new(Vec::new()));
        let mut handler = JobRequestHandler::new(2);
        for worker in [10, 11] {
            let sink = Rc::clone(&answers);
            handler.request(EntityId(worker), TileCoord::new(0, 0), &[], move |jobs| {
                sink.borrow_mut().push((worker, jobs));
            });
        }

        assert_eq!(handler.update(&store), 2);
        let answers = answers.borrow();
        assert_eq!(answers[0], (10, vec![JobId(1)]));
        assert_eq!(answers[1], (11, vec![JobId(1)]));
    }

    #[test]
    fn test_cancelled_request_is_dropped() {
        let store = JobStore::new(0.0);
        let called = Rc::new(RefCell::new(false));
        let mut handler = JobRequestHandler::new(2);

        let flag = Rc::clone(&called);
        let id = handler.request(EntityId(1), TileCoord::new(0, 0), &[], move |_| {
            *flag.borrow_mut() = true;
        });
        assert!(handler.cancel(id));
        assert!(!handler.cancel(RequestId(999)));

        assert_eq!(handler.update(&store), 0);
        assert_eq!(handler.pending(), 0);
        assert!(!*called.borrow());
    }
}
