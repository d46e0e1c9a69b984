//! FIFO storage for queued jobs.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use super::{Job, JobId, QueueError};

/// Ordered container of Queued jobs with a hard capacity.
///
/// Only Queued jobs live here. The running job and finished jobs are held by
/// the scheduler.
#[derive(Debug)]
pub struct JobStore {
    jobs: VecDeque<Job>,
    capacity: usize,
}

impl JobStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of queued jobs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Find the queued job owned by `caller`.
    pub fn find_active(&self, caller: &str) -> Option<&Job> {
        self.jobs
            .iter()
            .find(|job| job.caller == caller && job.state.is_active())
    }

    /// Append to the FIFO tail.
    ///
    /// The capacity check counts queued jobs only; the running job does not
    /// occupy a queue slot.
    pub fn append(&mut self, job: Job, estimated_wait_secs: u64) -> Result<(), QueueError> {
        if self.jobs.len() >= self.capacity {
            return Err(QueueError::QueueFull {
                capacity: self.capacity,
                estimated_wait_secs,
            });
        }
        self.jobs.push_back(job);
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// 1-indexed position in the FIFO, or 0 if the job is not queued.
    pub fn position_of(&self, job_id: JobId) -> usize {
        self.jobs
            .iter()
            .position(|job| job.id == job_id)
            .map_or(0, |index| index + 1)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Remove a queued job regardless of its position.
    pub fn remove(&mut self, job_id: JobId) -> Option<Job> {
        let index = self.jobs.iter().position(|job| job.id == job_id)?;
        self.jobs.remove(index)
    }

    /// Drop every job admitted before `cutoff`, returning their ids.
    pub fn purge_created_before(&mut self, cutoff: DateTime<Utc>) -> Vec<JobId> {
        let mut purged = Vec::new();
        self.jobs.retain(|job| {
            if job.created_at < cutoff {
                purged.push(job.id);
                false
            } else {
                true
            }
        });
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn queued(caller: &str, at: DateTime<Utc>) -> Job {
        Job::new(caller, format!("{caller}.fasta"), 1024, 30, at)
    }

    #[test]
    fn test_append_and_positions() {
        let now = Utc::now();
        let mut store = JobStore::new(3);
        let a = queued("a", now);
        let b = queued("b", now);
        let (a_id, b_id) = (a.id, b.id);

        store.append(a, 0).unwrap();
        store.append(b, 0).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.position_of(a_id), 1);
        assert_eq!(store.position_of(b_id), 2);
        assert_eq!(store.position_of(JobId::new()), 0);
        assert_eq!(store.find_active("b").map(|j| j.id), Some(b_id));
        assert!(store.find_active("c").is_none());
    }

    #[test]
    fn test_append_rejects_when_full() {
        let now = Utc::now();
        let mut store = JobStore::new(1);
        store.append(queued("a", now), 0).unwrap();

        let err = store.append(queued("b", now), 45).unwrap_err();
        assert_eq!(
            err,
            QueueError::QueueFull {
                capacity: 1,
                estimated_wait_secs: 45
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_pop_front_is_fifo() {
        let now = Utc::now();
        let mut store = JobStore::new(5);
        for caller in ["a", "b", "c"] {
            store.append(queued(caller, now), 0).unwrap();
        }

        let order: Vec<String> = std::iter::from_fn(|| store.pop_front())
            .map(|job| job.caller)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_closes_gap() {
        let now = Utc::now();
        let mut store = JobStore::new(5);
        let a = queued("a", now);
        let b = queued("b", now);
        let c = queued("c", now);
        let (b_id, c_id) = (b.id, c.id);
        store.append(a, 0).unwrap();
        store.append(b, 0).unwrap();
        store.append(c, 0).unwrap();

        assert_eq!(store.remove(b_id).map(|j| j.caller), Some("b".to_string()));
        assert_eq!(store.position_of(c_id), 2);
        assert!(store.remove(b_id).is_none());
    }

    #[test]
    fn test_purge_created_before() {
        let now = Utc::now();
        let mut store = JobStore::new(5);
        let old = queued("old", now - Duration::hours(2));
        let fresh = queued("fresh", now);
        let old_id = old.id;
        store.append(old, 0).unwrap();
        store.append(fresh, 0).unwrap();

        let purged = store.purge_created_before(now - Duration::hours(1));
        assert_eq!(purged, vec![old_id]);
        assert_eq!(store.len(), 1);
        assert!(store.find_active("old").is_none());
    }
}
