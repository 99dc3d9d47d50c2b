//! In-process backends.
//!
//! Same contracts as the Redis backends, held in memory. Used by tests and by
//! single-process deployments that do not need durability.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::Instant;

use avenc_models::{EncodingStatus, JobDescriptor, JobId, StatusEvent};

use crate::claim::{ClaimStore, DEFAULT_CLAIM_LEASE};
use crate::error::{QueueError, QueueResult};
use crate::job::QueueEntry;
use crate::queue::{JobQueue, STATUS_HISTORY_TTL_SECS};
use crate::status::{StatusChannel, StatusStream};

/// Capacity of the live status broadcast buffer.
const STATUS_BROADCAST_CAPACITY: usize = 1024;

#[derive(Default)]
struct QueueState {
    /// (score, insertion sequence) -> entry
    ordered: BTreeMap<(i64, u64), QueueEntry>,
    index: HashMap<JobId, (i64, u64)>,
    next_seq: u64,
}

/// In-memory job queue with push wakeup for idle workers.
#[derive(Default)]
pub struct MemoryJobQueue {
    state: Mutex<QueueState>,
    work_available: Notify,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, descriptor: JobDescriptor) -> QueueResult<QueueEntry> {
        descriptor.validate()?;

        let entry = QueueEntry::new(descriptor);
        {
            let mut state = self.state.lock().await;
            if state.index.contains_key(entry.job_id()) {
                return Err(QueueError::DuplicateJob(entry.job_id().clone()));
            }
            let key = (entry.score(), state.next_seq);
            state.next_seq += 1;
            state.index.insert(entry.job_id().clone(), key);
            state.ordered.insert(key, entry.clone());
        }

        self.work_available.notify_waiters();
        Ok(entry)
    }

    async fn scan_pending(&self, limit: usize) -> QueueResult<Vec<QueueEntry>> {
        let state = self.state.lock().await;
        Ok(state.ordered.values().take(limit).cloned().collect())
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<QueueEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .index
            .get(job_id)
            .and_then(|key| state.ordered.get(key))
            .cloned())
    }

    async fn remove(&self, job_id: &JobId) -> QueueResult<bool> {
        let mut state = self.state.lock().await;
        match state.index.remove(job_id) {
            Some(key) => {
                state.ordered.remove(&key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn len(&self) -> QueueResult<u64> {
        Ok(self.state.lock().await.ordered.len() as u64)
    }

    async fn wait_for_work(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.work_available.notified()).await;
    }
}

struct Lease {
    owner: String,
    expires_at: Instant,
}

/// In-memory claim store with lease expiry.
pub struct MemoryClaimStore {
    lease: Duration,
    claims: Mutex<HashMap<JobId, Lease>>,
}

impl MemoryClaimStore {
    pub fn new(lease: Duration) -> Self {
        Self {
            lease,
            claims: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryClaimStore {
    fn default() -> Self {
        Self::new(DEFAULT_CLAIM_LEASE)
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn try_claim(&self, job_id: &JobId, owner: &str) -> QueueResult<bool> {
        let now = Instant::now();
        let mut claims = self.claims.lock().await;
        if let Some(existing) = claims.get(job_id) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }
        claims.insert(
            job_id.clone(),
            Lease {
                owner: owner.to_string(),
                expires_at: now + self.lease,
            },
        );
        Ok(true)
    }

    async fn renew(&self, job_id: &JobId, owner: &str) -> QueueResult<bool> {
        let now = Instant::now();
        let mut claims = self.claims.lock().await;
        match claims.get_mut(job_id) {
            Some(lease) if lease.owner == owner && lease.expires_at > now => {
                lease.expires_at = now + self.lease;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, job_id: &JobId, owner: &str) -> QueueResult<()> {
        let mut claims = self.claims.lock().await;
        if claims.get(job_id).is_some_and(|lease| lease.owner == owner) {
            claims.remove(job_id);
        }
        Ok(())
    }

    async fn owner(&self, job_id: &JobId) -> QueueResult<Option<String>> {
        let now = Instant::now();
        let claims = self.claims.lock().await;
        Ok(claims
            .get(job_id)
            .filter(|lease| lease.expires_at > now)
            .map(|lease| lease.owner.clone()))
    }
}

struct History {
    events: Vec<StatusEvent>,
    touched_at: Instant,
}

/// In-memory status channel.
///
/// Like the Redis backend, a history is dropped once `history_ttl` has
/// passed since its last event.
pub struct MemoryStatusChannel {
    histories: Mutex<HashMap<JobId, History>>,
    live: broadcast::Sender<StatusEvent>,
    history_ttl: Duration,
}

impl MemoryStatusChannel {
    pub fn new() -> Self {
        Self::with_history_ttl(Duration::from_secs(STATUS_HISTORY_TTL_SECS))
    }

    pub fn with_history_ttl(history_ttl: Duration) -> Self {
        let (live, _) = broadcast::channel(STATUS_BROADCAST_CAPACITY);
        Self {
            histories: Mutex::new(HashMap::new()),
            live,
            history_ttl,
        }
    }
}

impl Default for MemoryStatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusChannel for MemoryStatusChannel {
    async fn publish(&self, job_id: &JobId, status: EncodingStatus) -> QueueResult<StatusEvent> {
        let event = StatusEvent::new(job_id.clone(), status);
        let now = Instant::now();
        {
            let mut histories = self.histories.lock().await;
            histories.retain(|_, history| now - history.touched_at < self.history_ttl);
            let history = histories.entry(job_id.clone()).or_insert_with(|| History {
                events: Vec::new(),
                touched_at: now,
            });
            history.events.push(event.clone());
            history.touched_at = now;
        }
        // No subscribers is fine
        let _ = self.live.send(event.clone());
        Ok(event)
    }

    async fn history(&self, job_id: &JobId) -> QueueResult<Vec<StatusEvent>> {
        Ok(self
            .histories
            .lock()
            .await
            .get(job_id)
            .filter(|history| history.touched_at.elapsed() < self.history_ttl)
            .map(|history| history.events.clone())
            .unwrap_or_default())
    }

    async fn subscribe(&self, job_id: &JobId) -> QueueResult<StatusStream> {
        let rx = self.live.subscribe();
        let job_id = job_id.clone();

        let stream = futures_util::stream::unfold((rx, job_id), |(mut rx, job_id)| async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.job_id == job_id => return Some((event, (rx, job_id))),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
