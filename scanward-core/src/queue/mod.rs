//! Deferred scan-run queue and the worker liveness registry.
//!
//! Delivery is at-least-once: a job leased by a worker that dies before
//! acknowledging it is handed out again once its lease expires. Live workers
//! renew their lease while a scan runs.

pub mod job;
pub mod memory;
pub mod postgres;
pub mod workers;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::ScanId;
use crate::error::Result;

pub use job::{JobHandle, JobId, JobState, LeaseId, LeaseRenewal, LeasedJob};
pub use memory::{InMemoryJobQueue, InMemoryWorkerRegistry};
pub use postgres::{PostgresJobQueue, PostgresWorkerRegistry};
pub use workers::heartbeat_is_fresh;

/// Default lease granted on dequeue.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(15 * 60);

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Schedule one run of `scan_id`.
    async fn enqueue(&self, scan_id: ScanId) -> Result<JobHandle>;

    /// Lease the oldest ready job, first returning expired leases to the
    /// ready set.
    async fn dequeue(&self, worker_id: &str) -> Result<Option<LeasedJob>>;

    /// Extend a lease that is still held. `NotFound` once the lease was
    /// settled or handed to another worker.
    async fn renew(&self, renewal: LeaseRenewal) -> Result<DateTime<Utc>>;

    /// Settle the delivery identified by `lease_id`. `NotFound` when that
    /// lease is no longer the job's current one.
    async fn complete(&self, lease_id: LeaseId) -> Result<()>;

    async fn fail(&self, lease_id: LeaseId, error: &str) -> Result<()>;

    /// Lease length granted by `dequeue`; holders renew well before it runs out.
    fn lease_ttl(&self) -> Duration;

    /// Jobs waiting to be leased.
    async fn depth(&self) -> Result<u64>;
}

/// Tracks worker heartbeats so the HTTP layer can report liveness.
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    async fn heartbeat(&self, worker_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Most recent heartbeat across all registered workers.
    async fn latest_heartbeat(&self) -> Result<Option<DateTime<Utc>>>;

    async fn deregister(&self, worker_id: &str) -> Result<()>;
}
