//! Dispatcher: the claim-and-process loop of one worker instance.
//!
//! Each iteration scans the oldest pending entries, claims the first one it
//! can win, re-checks that the entry still exists, runs the pipeline while
//! renewing the claim lease, then removes the entry and releases the claim
//! in that order.
//!
//! An id whose claim was lost is not tried again until it drops out of a
//! scan, or until a full lease has passed and the holder may have died.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use avenc_models::JobId;
use avenc_queue::{ClaimStore, JobQueue, QueueEntry};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::EncodingPipeline;
use crate::retry::{retry_async, FailureTracker, RetryConfig};

/// Consecutive scan failures logged before suppression kicks in.
const MAX_LOGGED_POLL_FAILURES: u32 = 3;

/// Loop timing for a dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub scan_batch: usize,
    pub idle_backoff: Duration,
    pub max_idle_backoff: Duration,
    pub heartbeat_interval: Duration,
    /// Lease length; also how long a lost claim is left alone.
    pub claim_lease: Duration,
}

impl From<&WorkerConfig> for DispatcherConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            scan_batch: config.scan_batch,
            idle_backoff: config.idle_backoff,
            max_idle_backoff: config.max_idle_backoff,
            heartbeat_interval: config.heartbeat_interval,
            claim_lease: config.claim_lease,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

/// What a single poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A job was claimed and driven to a terminal state.
    Processed(JobId),
    /// Nothing pending, or every pending job was claimed elsewhere.
    Idle,
}

pub struct Dispatcher {
    worker_id: String,
    queue: Arc<dyn JobQueue>,
    claims: Arc<dyn ClaimStore>,
    pipeline: Arc<EncodingPipeline>,
    config: DispatcherConfig,
    /// Ids whose claim this worker lost, and when.
    lost_claims: Mutex<HashMap<JobId, tokio::time::Instant>>,
}

impl Dispatcher {
    pub fn new(
        worker_id: impl Into<String>,
        queue: Arc<dyn JobQueue>,
        claims: Arc<dyn ClaimStore>,
        pipeline: Arc<EncodingPipeline>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            queue,
            claims,
            pipeline,
            config,
            lost_claims: Mutex::new(HashMap::new()),
        }
    }

    /// Poll until `shutdown` fires.
    ///
    /// Cancellation is observed between jobs and during idle waits; a job
    /// that has been claimed always runs to completion.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(worker_id = %self.worker_id, "Dispatcher started");

        let mut idle_delay = self.config.idle_backoff;
        let mut failures = FailureTracker::new(MAX_LOGGED_POLL_FAILURES);

        while !shutdown.is_cancelled() {
            match self.poll_once().await {
                Ok(PollOutcome::Processed(_)) => {
                    failures.record_success();
                    idle_delay = self.config.idle_backoff;
                    continue;
                }
                Ok(PollOutcome::Idle) => {
                    failures.record_success();
                    metrics::record_idle_poll();
                }
                Err(e) => {
                    if failures.record_failure() {
                        warn!(worker_id = %self.worker_id, "Queue poll failed: {}", e);
                    }
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.queue.wait_for_work(idle_delay) => {}
            }
            idle_delay = (idle_delay * 2).min(self.config.max_idle_backoff);
        }

        info!(worker_id = %self.worker_id, "Dispatcher stopped");
    }

    /// Scan once and process at most one job.
    pub async fn poll_once(&self) -> WorkerResult<PollOutcome> {
        let pending = self.queue.scan_pending(self.config.scan_batch).await?;
        self.forget_lost_claims(&pending).await;

        for candidate in pending {
            let job_id = candidate.job_id().clone();

            if self.lost_claims.lock().await.contains_key(&job_id) {
                continue;
            }

            if !self.claims.try_claim(&job_id, &self.worker_id).await? {
                metrics::record_claim_lost();
                debug!(worker_id = %self.worker_id, job_id = %job_id, "Claim lost");
                self.lost_claims
                    .lock()
                    .await
                    .insert(job_id, tokio::time::Instant::now());
                continue;
            }
            metrics::record_claim_won();

            // The scan may be stale: another worker could have finished the
            // job and released its claim since.
            let entry = match self.queue.get(&job_id).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    debug!(worker_id = %self.worker_id, job_id = %job_id, "Entry gone after claim");
                    self.release(&job_id).await;
                    continue;
                }
                Err(e) => {
                    self.release(&job_id).await;
                    return Err(e.into());
                }
            };

            self.process(entry).await;
            return Ok(PollOutcome::Processed(job_id));
        }

        Ok(PollOutcome::Idle)
    }

    /// Drop lost-claim records for ids missing from this scan, and for
    /// losses older than a lease.
    async fn forget_lost_claims(&self, pending: &[QueueEntry]) {
        let mut lost = self.lost_claims.lock().await;
        if lost.is_empty() {
            return;
        }
        let queued: HashSet<&JobId> = pending.iter().map(QueueEntry::job_id).collect();
        lost.retain(|job_id, lost_at| {
            queued.contains(job_id) && lost_at.elapsed() < self.config.claim_lease
        });
    }

    /// Drive a claimed entry to a terminal state, then clean up.
    async fn process(&self, entry: QueueEntry) {
        let job_id = entry.job_id().clone();
        let logger = JobLogger::new(&job_id, &self.worker_id);
        let span = logger.create_span();
        logger.log_start(&format!(
            "{} -> {}",
            entry.descriptor.source_format_hint, entry.descriptor.output_format
        ));

        let started = Instant::now();
        let result = self
            .run_with_heartbeat(&entry, &logger)
            .instrument(span)
            .await;

        match &result {
            Ok(()) => {
                metrics::record_job_finished(started.elapsed());
                logger.log_completion(started.elapsed());
            }
            Err(e) if e.is_pipeline_fatal() => {
                metrics::record_job_failed(e.stage(), started.elapsed())
            }
            Err(e) => {
                // No terminal status: keep the entry and let the lease lapse
                // so the job is re-offered.
                metrics::record_job_failed(e.stage(), started.elapsed());
                logger.log_warning(&format!("Job left queued: {}", e));
                return;
            }
        }

        // Remove before release so the job cannot be claimed again
        let remove = RetryConfig::new("remove_queue_entry");
        if let Err(e) = retry_async(&remove, || self.queue.remove(&job_id)).await {
            logger.log_warning(&format!("Queue entry not removed: {}", e));
        }
        self.release(&job_id).await;
    }

    async fn run_with_heartbeat(&self, entry: &QueueEntry, logger: &JobLogger) -> WorkerResult<()> {
        // Both futures are polled together, so a slow renewal never holds
        // up the pipeline.
        tokio::select! {
            result = self.pipeline.run(&entry.descriptor, logger) => result,
            never = self.heartbeat(entry.job_id(), logger) => match never {},
        }
    }

    async fn heartbeat(&self, job_id: &JobId, logger: &JobLogger) -> Infallible {
        let period = self.config.heartbeat_interval;
        let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticks.tick().await;
            self.renew(job_id, logger).await;
        }
    }

    async fn renew(&self, job_id: &JobId, logger: &JobLogger) {
        match self.claims.renew(job_id, &self.worker_id).await {
            Ok(true) => debug!(worker_id = %self.worker_id, job_id = %job_id, "Claim renewed"),
            Ok(false) => logger.log_warning("Claim lease lost while processing"),
            Err(e) => logger.log_warning(&format!("Claim renewal failed: {}", e)),
        }
    }

    async fn release(&self, job_id: &JobId) {
        let retry = RetryConfig::new("release_claim");
        if let Err(e) = retry_async(&retry, || self.claims.release(job_id, &self.worker_id)).await {
            warn!(worker_id = %self.worker_id, job_id = %job_id, "Claim not released: {}", e);
        }
    }
}
