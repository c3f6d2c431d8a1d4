//! Background consumers of the scan-run queue.
//!
//! A [`WorkerPool`] owns N [`ScanWorker`] loops plus one heartbeat task.
//! Workers lease a job, hand its scan to the [`ScanRunner`] and acknowledge
//! the job afterwards. A scan that is running when shutdown is requested is
//! allowed to finish.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::queue::{JobQueue, LeaseRenewal, LeasedJob, WorkerRegistry};
use crate::runner::{RunReport, ScanRunner};

const MIN_RENEW_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub concurrency: usize,
    /// Sleep between dequeue attempts while the queue is empty.
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    /// How long shutdown waits for an in-flight scan.
    pub shutdown_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            poll_interval: Duration::from_millis(1000),
            heartbeat_interval: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// One job-consuming loop.
#[derive(Clone)]
pub struct ScanWorker {
    id: String,
    runner: ScanRunner,
    queue: Arc<dyn JobQueue>,
}

impl fmt::Debug for ScanWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanWorker")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl ScanWorker {
    pub fn new(id: impl Into<String>, runner: ScanRunner, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            id: id.into(),
            runner,
            queue,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Lease and process at most one job. Returns whether a job was found.
    pub async fn process_next(&self) -> Result<bool> {
        let Some(job) = self.queue.dequeue(&self.id).await? else {
            return Ok(false);
        };
        self.process(job).await?;
        Ok(true)
    }

    async fn process(&self, job: LeasedJob) -> Result<()> {
        debug!(
            worker = %self.id,
            job_id = %job.id,
            scan_id = %job.scan_id,
            attempts = job.attempts,
            "leased scan job"
        );

        match self.run_holding_lease(&job).await {
            Ok(report) => {
                if let RunReport::Finished { status, .. } = &report {
                    debug!(worker = %self.id, job_id = %job.id, %status, "scan job done");
                }
                self.queue.complete(job.lease_id).await
            }
            Err(err) => {
                error!(
                    worker = %self.id,
                    job_id = %job.id,
                    scan_id = %job.scan_id,
                    error = %err,
                    "scan run failed"
                );
                self.queue.fail(job.lease_id, &err.to_string()).await
            }
        }
    }

    /// Run the job's scan, renewing the lease every third of its TTL until
    /// the run returns.
    async fn run_holding_lease(&self, job: &LeasedJob) -> Result<RunReport> {
        let ttl = self.queue.lease_ttl();
        let period = (ttl / 3).max(MIN_RENEW_PERIOD);
        let mut renew = tokio::time::interval_at(Instant::now() + period, period);
        renew.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let run = self.runner.run(job.scan_id);
        tokio::pin!(run);
        loop {
            tokio::select! {
                report = &mut run => return report,
                _ = renew.tick() => {
                    let renewal = LeaseRenewal { lease_id: job.lease_id, extend_by: ttl };
                    match self.queue.renew(renewal).await {
                        Ok(expires_at) => {
                            debug!(worker = %self.id, job_id = %job.id, %expires_at, "lease renewed");
                        }
                        Err(err) => {
                            warn!(
                                worker = %self.id,
                                job_id = %job.id,
                                error = %err,
                                "lease renewal failed"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Consume jobs until `shutdown` fires.
    pub async fn run(self, poll_interval: Duration, shutdown: CancellationToken) {
        info!(worker = %self.id, "worker started");
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let found = match self.process_next().await {
                Ok(found) => found,
                Err(err) => {
                    warn!(worker = %self.id, error = %err, "worker iteration failed");
                    false
                }
            };
            if found {
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
        info!(worker = %self.id, "worker shutting down");
    }
}

/// Set of workers sharing one queue, one runner and one heartbeat identity.
pub struct WorkerPool {
    id: String,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    registry: Arc<dyn WorkerRegistry>,
    shutdown_timeout: Duration,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.id)
            .field("tasks", &self.handles.len())
            .field("shutdown_cancelled", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `settings.concurrency` workers and the heartbeat task. Cancelling
    /// `shutdown` (or calling [`WorkerPool::shutdown`]) stops them.
    pub fn start(
        runner: ScanRunner,
        queue: Arc<dyn JobQueue>,
        registry: Arc<dyn WorkerRegistry>,
        settings: WorkerSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let simple = Uuid::now_v7().simple().to_string();
        let suffix = &simple[simple.len() - 8..];
        let id = format!("scanward-{}-{suffix}", std::process::id());
        let mut handles = Vec::with_capacity(settings.concurrency + 1);

        handles.push(Self::spawn_heartbeat(
            id.clone(),
            Arc::clone(&registry),
            settings.heartbeat_interval,
            shutdown.clone(),
        ));

        for i in 0..settings.concurrency.max(1) {
            let worker = ScanWorker::new(format!("{id}-w{i}"), runner.clone(), Arc::clone(&queue));
            let token = shutdown.clone();
            handles.push(tokio::spawn(worker.run(settings.poll_interval, token)));
        }

        info!(pool = %id, workers = settings.concurrency.max(1), "worker pool started");
        Self {
            id,
            shutdown,
            handles,
            registry,
            shutdown_timeout: settings.shutdown_timeout,
        }
    }

    fn spawn_heartbeat(
        id: String,
        registry: Arc<dyn WorkerRegistry>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = registry.heartbeat(&id, Utc::now()).await {
                            warn!(pool = %id, error = %err, "failed to record heartbeat");
                        }
                    }
                }
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stop every task, wait for in-flight scans and remove the heartbeat.
    pub async fn shutdown(self) {
        info!(pool = %self.id, "initiating worker pool shutdown");
        self.shutdown.cancel();

        for handle in self.handles {
            match tokio::time::timeout(self.shutdown_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("worker task failed: {e:?}"),
                Err(_) => warn!("worker task timed out during shutdown"),
            }
        }

        if let Err(err) = self.registry.deregister(&self.id).await {
            warn!(pool = %self.id, error = %err, "failed to deregister worker pool");
        }
    }
}
