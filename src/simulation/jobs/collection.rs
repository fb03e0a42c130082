//! Per-state job index
//!
//! A `JobCollection` holds the ids of every job in one state, overall and
//! grouped by required profession. `next()` walks the overall set with a
//! round-robin cursor so per-tick work can be amortized across calls.
//!
//! The cursor remembers the last id it returned rather than a position, so
//! ids may be inserted or removed between calls without invalidating it.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound::{Excluded, Unbounded};

use crate::simulation::colonists::professions::Profession;
use crate::simulation::jobs::types::{JobId, JobState};

#[derive(Clone, Debug)]
pub struct JobCollection {
    state: JobState,
    all: BTreeSet<JobId>,
    by_profession: HashMap<Option<Profession>, BTreeSet<JobId>>,
    cursor: Option<JobId>,
}

impl JobCollection {
    pub fn new(state: JobState) -> Self {
        JobCollection {
            state,
            all: BTreeSet::new(),
            by_profession: HashMap::new(),
            cursor: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Returns false if the job was already present
    pub fn add(&mut self, job: JobId, profession: Option<Profession>) -> bool {
        if !self.all.insert(job) {
            return false;
        }
        self.by_profession.entry(profession).or_default().insert(job);
        true
    }

    /// Returns false if the job was not present
    pub fn remove(&mut self, job: JobId, profession: Option<Profession>) -> bool {
        if !self.all.remove(&job) {
            return false;
        }
        let emptied = match self.by_profession.get_mut(&profession) {
            Some(group) => {
                group.remove(&job);
                group.is_empty()
            }
            None => false,
        };
        if emptied {
            self.by_profession.remove(&profession);
        }
        true
    }

    /// Remove a job without knowing which profession it was filed under
    pub fn purge(&mut self, job: JobId) -> bool {
        if !self.all.remove(&job) {
            return false;
        }
        self.by_profession.retain(|_, group| {
            group.remove(&job);
            !group.is_empty()
        });
        true
    }

    pub fn contains(&self, job: JobId) -> bool {
        self.all.contains(&job)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = JobId> + '_ {
        self.all.iter().copied()
    }

    /// Jobs filed under exactly this requirement (`None` = anyone)
    pub fn with_profession(
        &self,
        profession: Option<Profession>,
    ) -> impl Iterator<Item = JobId> + '_ {
        self.by_profession
            .get(&profession)
            .into_iter()
            .flat_map(|group| group.iter().copied())
    }

    /// Advance the round-robin cursor, wrapping at the end
    pub fn next(&mut self) -> Option<JobId> {
        let next = match self.cursor {
            Some(last) => self
                .all
                .range((Excluded(last), Unbounded))
                .next()
                .or_else(|| self.all.iter().next())
                .copied(),
            None => self.all.iter().next().copied(),
        };
        self.cursor = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(ids: &[u64]) -> JobCollection {
        let mut collection = JobCollection::new(JobState::PotentiallyAccessible);
        for &id in ids {
            collection.add(JobId(id), Some(Profession::Miner));
        }
        collection
    }

    #[test]
    fn test_next_wraps_around() {
        let mut collection = filled(&[1, 2, 3]);
        let visited: Vec<u64> = (0..5).filter_map(|_| collection.next()).map(|j| j.0).collect();
        assert_eq!(visited, vec![1, 2, 3, 1, 2]);
    }

    #[test]
    fn test_next_on_empty() {
        let mut collection = JobCollection::new(JobState::Assigned);
        assert_eq!(collection.next(), None);
        assert!(collection.is_empty());
    }

    #[test]
    fn test_removal_during_round_robin_keeps_position() {
        let mut collection = filled(&[1, 2, 3, 4]);
        assert_eq!(collection.next(), Some(JobId(1)));
        assert_eq!(collection.next(), Some(JobId(2)));

        // Removing the job under the cursor must not reset the walk
        collection.remove(JobId(2), Some(Profession::Miner));
        assert_eq!(collection.next(), Some(JobId(3)));

        collection.add(JobId(10), None);
        assert_eq!(collection.next(), Some(JobId(4)));
        assert_eq!(collection.next(), Some(JobId(10)));
        assert_eq!(collection.next(), Some(JobId(1)));
    }

    #[test]
    fn test_every_job_visited_within_k_calls() {
        let mut collection = filled(&[5, 9, 12, 40, 41]);
        collection.next();
        let mut seen = BTreeSet::new();
        for _ in 0..collection.len() {
            seen.insert(collection.next().unwrap());
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_profession_grouping() {
        let mut collection = JobCollection::new(JobState::Assignable);
        collection.add(JobId(1), Some(Profession::Miner));
        collection.add(JobId(2), Some(Profession::Chef));
        collection.add(JobId(3), None);
        assert!(!collection.add(JobId(3), None));

        let miners: Vec<JobId> = collection.with_profession(Some(Profession::Miner)).collect();
        assert_eq!(miners, vec![JobId(1)]);
        assert_eq!(collection.with_profession(Some(Profession::Hauler)).count(), 0);

        assert!(collection.purge(JobId(2)));
        assert_eq!(collection.with_profession(Some(Profession::Chef)).count(), 0);
        assert!(!collection.remove(JobId(2), Some(Profession::Chef)));
        assert_eq!(collection.len(), 2);
    }
}
