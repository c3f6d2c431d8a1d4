use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{
    DEFAULT_LEASE_TTL, JobHandle, JobId, JobQueue, JobState, LeaseId, LeaseRenewal, LeasedJob,
    WorkerRegistry,
};
use crate::domain::ScanId;
use crate::error::{CoreError, Result};

/// Settled jobs remembered for inspection before the oldest are dropped.
pub const SETTLED_HISTORY: usize = 256;

#[derive(Debug, Clone)]
struct JobRecord {
    scan_id: ScanId,
    state: JobState,
    attempts: u32,
    lease_id: Option<LeaseId>,
    lease_owner: Option<String>,
    lease_expires_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl JobRecord {
    fn release(&mut self) {
        self.lease_id = None;
        self.lease_owner = None;
        self.lease_expires_at = None;
    }
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<JobId>,
    jobs: HashMap<JobId, JobRecord>,
    /// Settled job ids, oldest first.
    settled: VecDeque<JobId>,
}

impl QueueState {
    fn requeue_expired(&mut self, now: DateTime<Utc>) {
        let mut expired: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, job)| {
                job.state == JobState::Leased && job.lease_expires_at.is_some_and(|at| at < now)
            })
            .map(|(id, _)| *id)
            .collect();
        expired.sort();

        for id in expired {
            if let Some(job) = self.jobs.get_mut(&id) {
                warn!(job_id = %id, scan_id = %job.scan_id, "lease expired; requeueing job");
                job.state = JobState::Ready;
                job.release();
                self.ready.push_front(id);
            }
        }
    }

    fn held_mut(&mut self, lease_id: LeaseId) -> Result<(JobId, &mut JobRecord)> {
        self.jobs
            .iter_mut()
            .find(|(_, job)| job.state == JobState::Leased && job.lease_id == Some(lease_id))
            .map(|(id, job)| (*id, job))
            .ok_or_else(|| CoreError::NotFound(format!("lease {lease_id} is not held by any job")))
    }

    fn settle(&mut self, lease_id: LeaseId, state: JobState, error: Option<String>) -> Result<()> {
        let (job_id, job) = self.held_mut(lease_id)?;
        job.state = state;
        job.release();
        job.last_error = error;

        self.settled.push_back(job_id);
        while self.settled.len() > SETTLED_HISTORY {
            if let Some(oldest) = self.settled.pop_front() {
                self.jobs.remove(&oldest);
            }
        }
        Ok(())
    }
}

/// Process-local queue. Jobs do not survive a restart, and only the last
/// [`SETTLED_HISTORY`] settled jobs are kept.
#[derive(Debug, Clone)]
pub struct InMemoryJobQueue {
    state: Arc<Mutex<QueueState>>,
    lease_ttl: Duration,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_LEASE_TTL)
    }
}

impl InMemoryJobQueue {
    pub fn new(lease_ttl: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            lease_ttl,
        }
    }

    fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CoreError::Internal(format!("invalid lease ttl: {e}")))?;
        Ok(now + ttl)
    }

    /// Last known state of a job, if it is still remembered.
    pub async fn state_of(&self, job_id: JobId) -> Option<JobState> {
        self.state.lock().await.jobs.get(&job_id).map(|job| job.state)
    }

    pub async fn last_error(&self, job_id: JobId) -> Option<String> {
        self.state
            .lock()
            .await
            .jobs
            .get(&job_id)
            .and_then(|job| job.last_error.clone())
    }

    /// Jobs currently remembered in any state.
    pub async fn tracked(&self) -> usize {
        self.state.lock().await.jobs.len()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, scan_id: ScanId) -> Result<JobHandle> {
        let id = JobId::new();
        let mut state = self.state.lock().await;
        state.jobs.insert(
            id,
            JobRecord {
                scan_id,
                state: JobState::Ready,
                attempts: 0,
                lease_id: None,
                lease_owner: None,
                lease_expires_at: None,
                last_error: None,
            },
        );
        state.ready.push_back(id);
        debug!(job_id = %id, scan_id = %scan_id, "enqueued scan run");
        Ok(JobHandle { id, scan_id })
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<LeasedJob>> {
        let now = Utc::now();
        let expires_at = Self::expiry_from(now, self.lease_ttl)?;

        let mut state = self.state.lock().await;
        state.requeue_expired(now);

        while let Some(id) = state.ready.pop_front() {
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            if job.state != JobState::Ready {
                continue;
            }
            let lease_id = LeaseId::new();
            job.state = JobState::Leased;
            job.attempts += 1;
            job.lease_id = Some(lease_id);
            job.lease_owner = Some(worker_id.to_string());
            job.lease_expires_at = Some(expires_at);
            return Ok(Some(LeasedJob {
                id,
                lease_id,
                scan_id: job.scan_id,
                attempts: job.attempts,
                lease_owner: worker_id.to_string(),
                lease_expires_at: expires_at,
            }));
        }
        Ok(None)
    }

    async fn renew(&self, renewal: LeaseRenewal) -> Result<DateTime<Utc>> {
        let expires_at = Self::expiry_from(Utc::now(), renewal.extend_by)?;
        let mut state = self.state.lock().await;
        let (_, job) = state.held_mut(renewal.lease_id)?;
        job.lease_expires_at = Some(expires_at);
        Ok(expires_at)
    }

    async fn complete(&self, lease_id: LeaseId) -> Result<()> {
        self.state
            .lock()
            .await
            .settle(lease_id, JobState::Completed, None)
    }

    async fn fail(&self, lease_id: LeaseId, error: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .settle(lease_id, JobState::Failed, Some(error.to_string()))
    }

    async fn depth(&self) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .values()
            .filter(|job| job.state == JobState::Ready)
            .count() as u64)
    }

    fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }
}

/// Heartbeats kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkerRegistry {
    heartbeats: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryWorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkerRegistry for InMemoryWorkerRegistry {
    async fn heartbeat(&self, worker_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.heartbeats
            .lock()
            .await
            .insert(worker_id.to_string(), at);
        Ok(())
    }

    async fn latest_heartbeat(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.heartbeats.lock().await.values().max().copied())
    }

    async fn deregister(&self, worker_id: &str) -> Result<()> {
        self.heartbeats.lock().await.remove(worker_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jobs_are_delivered_in_fifo_order() {
        let queue = InMemoryJobQueue::default();
        let first = queue.enqueue(ScanId::new()).await.unwrap();
        let second = queue.enqueue(ScanId::new()).await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 2);

        let leased = queue.dequeue("w1").await.unwrap().unwrap();
        assert_eq!(leased.id, first.id);
        assert_eq!(leased.attempts, 1);
        assert_eq!(queue.dequeue("w1").await.unwrap().unwrap().id, second.id);
        assert!(queue.dequeue("w1").await.unwrap().is_none());
        assert_eq!(queue.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn completed_jobs_are_not_redelivered() {
        let queue = InMemoryJobQueue::default();
        let handle = queue.enqueue(ScanId::new()).await.unwrap();
        let leased = queue.dequeue("w1").await.unwrap().unwrap();
        queue.complete(leased.lease_id).await.unwrap();

        assert_eq!(queue.state_of(handle.id).await, Some(JobState::Completed));
        assert!(queue.dequeue("w2").await.unwrap().is_none());
        assert!(queue.complete(leased.lease_id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn failures_keep_the_error() {
        let queue = InMemoryJobQueue::default();
        let handle = queue.enqueue(ScanId::new()).await.unwrap();
        let leased = queue.dequeue("w1").await.unwrap().unwrap();
        queue.fail(leased.lease_id, "boom").await.unwrap();

        assert_eq!(queue.state_of(handle.id).await, Some(JobState::Failed));
        assert_eq!(queue.last_error(handle.id).await.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn expired_leases_are_redelivered() {
        let queue = InMemoryJobQueue::new(Duration::ZERO);
        let handle = queue.enqueue(ScanId::new()).await.unwrap();
        let first = queue.dequeue("crashed").await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let second = queue.dequeue("w2").await.unwrap().unwrap();
        assert_eq!(first.id, handle.id);
        assert_eq!(second.id, handle.id);
        assert_eq!(second.attempts, 2);
        assert_eq!(second.lease_owner, "w2");
        assert_ne!(second.lease_id, first.lease_id);
    }

    #[tokio::test]
    async fn stale_lease_cannot_settle_a_redelivered_job() {
        let queue = InMemoryJobQueue::new(Duration::from_millis(20));
        let handle = queue.enqueue(ScanId::new()).await.unwrap();
        let slow = queue.dequeue("worker-a").await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let current = queue.dequeue("worker-b").await.unwrap().unwrap();

        let renewal = LeaseRenewal {
            lease_id: slow.lease_id,
            extend_by: Duration::from_secs(60),
        };
        assert!(queue.renew(renewal).await.unwrap_err().is_not_found());
        assert!(queue.complete(slow.lease_id).await.unwrap_err().is_not_found());
        assert_eq!(queue.state_of(handle.id).await, Some(JobState::Leased));

        queue.complete(current.lease_id).await.unwrap();
        assert_eq!(queue.state_of(handle.id).await, Some(JobState::Completed));
    }

    #[tokio::test]
    async fn renewed_lease_is_not_redelivered() {
        let queue = InMemoryJobQueue::new(Duration::from_millis(30));
        queue.enqueue(ScanId::new()).await.unwrap();
        let held = queue.dequeue("worker-a").await.unwrap().unwrap();

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(15)).await;
            let expires_at = queue
                .renew(LeaseRenewal {
                    lease_id: held.lease_id,
                    extend_by: queue.lease_ttl(),
                })
                .await
                .unwrap();
            assert!(expires_at > held.lease_expires_at);
            assert!(queue.dequeue("worker-b").await.unwrap().is_none());
        }
        queue.complete(held.lease_id).await.unwrap();
    }

    #[tokio::test]
    async fn settled_history_is_bounded() {
        let queue = InMemoryJobQueue::default();
        let first = queue.enqueue(ScanId::new()).await.unwrap();
        for _ in 0..SETTLED_HISTORY {
            queue.enqueue(ScanId::new()).await.unwrap();
        }
        while let Some(job) = queue.dequeue("w1").await.unwrap() {
            queue.complete(job.lease_id).await.unwrap();
        }

        assert_eq!(queue.tracked().await, SETTLED_HISTORY);
        assert_eq!(queue.state_of(first.id).await, None);
    }

    #[tokio::test]
    async fn registry_reports_the_latest_heartbeat() {
        let registry = InMemoryWorkerRegistry::new();
        assert!(registry.latest_heartbeat().await.unwrap().is_none());

        let earlier = Utc::now() - chrono::Duration::seconds(10);
        let later = Utc::now();
        registry.heartbeat("a", earlier).await.unwrap();
        registry.heartbeat("b", later).await.unwrap();
        assert_eq!(registry.latest_heartbeat().await.unwrap(), Some(later));

        registry.deregister("b").await.unwrap();
        assert_eq!(registry.latest_heartbeat().await.unwrap(), Some(earlier));
    }
}
