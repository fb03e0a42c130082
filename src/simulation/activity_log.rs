//! Activity Log System
//!
//! Keeps a short history of job lifecycle events so a run can be summarised
//! after the fact. Structured diagnostics go through `tracing`; this log is
//! the bounded, queryable record the demo prints at the end.

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};

use crate::simulation::jobs::types::JobId;
use crate::simulation::types::{EntityId, TileCoord};

/// Default number of entries kept
pub const DEFAULT_ACTIVITY_ENTRIES: usize = 50;

/// Category of activity event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityCategory {
    /// Job added to the store
    Created,
    /// Worker claimed a job
    Assigned,
    Completed,
    /// Job removed without completing
    Removed,
    /// Sweep found an assignment its worker had forgotten
    Orphaned,
    /// A resource request could not reserve what it needed
    AllocationFailed,
    Error,
}

impl ActivityCategory {
    /// Get short label for display
    pub fn label(&self) -> &'static str {
        match self {
            ActivityCategory::Created => "NEW",
            ActivityCategory::Assigned => "ASN",
            ActivityCategory::Completed => "DON",
            ActivityCategory::Removed => "DEL",
            ActivityCategory::Orphaned => "ORP",
            ActivityCategory::AllocationFailed => "ALC",
            ActivityCategory::Error => "!!",
        }
    }

    fn importance(&self) -> u8 {
        match self {
            ActivityCategory::Created | ActivityCategory::Assigned => 1,
            ActivityCategory::Completed | ActivityCategory::Removed => 3,
            ActivityCategory::AllocationFailed => 5,
            ActivityCategory::Orphaned => 8,
            ActivityCategory::Error => 10,
        }
    }
}

/// An activity log entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Tick when this happened
    pub tick: u64,
    /// Tile the job sits on, when it has one
    pub location: Option<TileCoord>,
    pub category: ActivityCategory,
    /// Short description
    pub message: String,
    pub job: Option<JobId>,
    /// Worker involved (if any)
    pub worker: Option<EntityId>,
    /// Importance (higher = more important, shown first)
    pub importance: u8,
}

/// The activity log store
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
    /// Counters for stats
    pub stats: ActivityStats,
}

/// Statistics about activities. Counters cover the whole run, not just the
/// entries still held.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total_events: u64,
    pub created: u64,
    pub assigned: u64,
    pub completed: u64,
    pub removed: u64,
    pub orphaned: u64,
    pub allocation_failures: u64,
    pub errors: u64,
}

impl Default for ActivityLog {
    fn default() -> Self {
        ActivityLog::new(DEFAULT_ACTIVITY_ENTRIES)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        ActivityLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            stats: ActivityStats::default(),
        }
    }

    /// Add a new activity entry
    pub fn log(&mut self, entry: ActivityEntry) {
        self.stats.total_events += 1;
        match entry.category {
            ActivityCategory::Created => self.stats.created += 1,
            ActivityCategory::Assigned => self.stats.assigned += 1,
            ActivityCategory::Completed => self.stats.completed += 1,
            ActivityCategory::Removed => self.stats.removed += 1,
            ActivityCategory::Orphaned => self.stats.orphaned += 1,
            ActivityCategory::AllocationFailed => self.stats.allocation_failures += 1,
            ActivityCategory::Error => self.stats.errors += 1,
        }

        self.entries.push_back(entry);

        // Trim if over limit
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Log an event about one job
    pub fn log_job(
        &mut self,
        tick: u64,
        category: ActivityCategory,
        job: JobId,
        location: Option<TileCoord>,
        worker: Option<EntityId>,
        message: String,
    ) {
        self.log(ActivityEntry {
            tick,
            location,
            category,
            message,
            job: Some(job),
            worker,
            importance: category.importance(),
        });
    }

    /// Log an event with no job attached, such as a refused allocation
    pub fn log_event(
        &mut self,
        tick: u64,
        category: ActivityCategory,
        location: Option<TileCoord>,
        message: String,
    ) {
        self.log(ActivityEntry {
            tick,
            location,
            category,
            message,
            job: None,
            worker: None,
            importance: category.importance(),
        });
    }

    /// Get recent entries (newest first)
    pub fn recent_entries(&self, count: usize) -> Vec<&ActivityEntry> {
        self.entries.iter().rev().take(count).collect()
    }

    /// Entries about one job, newest first
    pub fn entries_for(&self, job: JobId) -> Vec<&ActivityEntry> {
        self.entries.iter().rev().filter(|e| e.job == Some(job)).collect()
    }

    /// Get entries for a specific location
    pub fn entries_at(&self, location: TileCoord, count: usize) -> Vec<&ActivityEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.location == Some(location))
            .take(count)
            .collect()
    }

    /// Get high-importance entries (orphans, errors)
    pub fn important_entries(&self, count: usize) -> Vec<&ActivityEntry> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| b.importance.cmp(&a.importance));
        entries.into_iter().take(count).collect()
    }

    /// Clear old entries (keep only recent ticks)
    pub fn clear_old(&mut self, current_tick: u64, keep_ticks: u64) {
        self.entries
            .retain(|e| current_tick.saturating_sub(e.tick) < keep_ticks);
    }

    /// Get total entry count
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_bounded_but_stats_are_not() {
        let mut log = ActivityLog::new(3);
        for i in 0..5 {
            log.log_job(i, ActivityCategory::Created, JobId(i), None, None, format!("job {i}"));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.stats.created, 5);
        assert_eq!(log.stats.total_events, 5);
        assert_eq!(log.recent_entries(1)[0].job, Some(JobId(4)));
    }

    #[test]
    fn test_important_entries_first() {
        let mut log = ActivityLog::default();
        let worker = Some(EntityId(2));
        log.log_job(1, ActivityCategory::Assigned, JobId(1), None, worker, "claimed".into());
        log.log_job(2, ActivityCategory::Orphaned, JobId(1), None, worker, "orphaned".into());
        log.log_event(3, ActivityCategory::AllocationFailed, None, "no logs".into());

        let important = log.important_entries(2);
        assert_eq!(important[0].category, ActivityCategory::Orphaned);
        assert_eq!(important[1].category, ActivityCategory::AllocationFailed);
        assert_eq!(log.entries_for(JobId(1)).len(), 2);
    }

    #[test]
    fn test_entries_at_and_clear_old() {
        let mut log = ActivityLog::default();
        let here = TileCoord::new(2, 2);
        log.log_job(1, ActivityCategory::Created, JobId(1), Some(here), None, "dig".into());
        log.log_job(10, ActivityCategory::Completed, JobId(1), Some(here), None, "dug".into());
        assert_eq!(log.entries_at(here, 10).len(), 2);

        log.clear_old(12, 5);
        assert_eq!(log.len(), 1);
        assert_eq!(log.recent_entries(5)[0].category, ActivityCategory::Completed);
    }
}
