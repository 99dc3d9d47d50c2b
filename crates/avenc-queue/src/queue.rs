//! Durable job queue.
//!
//! The Redis backend keeps two structures per namespace:
//! - a sorted set of pending job IDs scored by enqueue time (ms) plus a
//!   per-namespace sequence, so same-millisecond jobs keep insertion order
//! - a hash of job ID -> serialized [`QueueEntry`]
//!
//! Enqueue and remove touch both atomically, so a scan never sees an ID whose
//! entry was never written.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use tracing::{debug, info, warn};

use avenc_models::{JobDescriptor, JobId};

use crate::error::{QueueError, QueueResult};
use crate::job::QueueEntry;
use crate::keys::{QueueKeys, DEFAULT_NAMESPACE};

/// Default retention for status histories (24 hours).
pub const STATUS_HISTORY_TTL_SECS: u64 = 86_400;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Key namespace for queue, claims and status events
    pub namespace: String,
    /// How long a job's status history is kept after its last event
    pub status_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            status_ttl: Duration::from_secs(STATUS_HISTORY_TTL_SECS),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            namespace: std::env::var("AVENC_QUEUE_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string()),
            status_ttl: Duration::from_secs(
                std::env::var("AVENC_STATUS_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(STATUS_HISTORY_TTL_SECS),
            ),
        }
    }

    /// Key builder for the configured namespace.
    pub fn keys(&self) -> QueueKeys {
        QueueKeys::new(&self.namespace)
    }
}

/// Ordered, durable collection of pending jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add a job at the tail. Fails with [`QueueError::DuplicateJob`] if the
    /// ID is already queued.
    async fn enqueue(&self, descriptor: JobDescriptor) -> QueueResult<QueueEntry>;

    /// Up to `limit` pending entries in ascending enqueue-time order.
    ///
    /// The result may be stale by the time the caller acts on it.
    async fn scan_pending(&self, limit: usize) -> QueueResult<Vec<QueueEntry>>;

    /// Look up a single entry.
    async fn get(&self, job_id: &JobId) -> QueueResult<Option<QueueEntry>>;

    /// Remove an entry. Returns whether an entry was removed; removing an
    /// unknown ID is not an error.
    async fn remove(&self, job_id: &JobId) -> QueueResult<bool>;

    /// Number of pending entries.
    async fn len(&self) -> QueueResult<u64>;

    /// Suspend until new work may be available or `timeout` elapses.
    ///
    /// Backends without push notification simply sleep.
    async fn wait_for_work(&self, timeout: Duration) {
        tokio::time::sleep(timeout).await;
    }
}

/// Sequence slots per millisecond in a pending score.
const SEQUENCE_SLOTS: u32 = 1000;

// Score is ms * slots + (seq mod slots): equal millisecond scores would
// otherwise sort by member name. Formatted with %.0f so the integer survives
// Lua's number-to-string conversion.
const ENQUEUE_SCRIPT: &str = r#"
if redis.call('HEXISTS', KEYS[2], ARGV[1]) == 1 then
    return 0
end
local seq = redis.call('INCR', KEYS[3]) % tonumber(ARGV[4])
local score = string.format('%.0f', tonumber(ARGV[3]) * tonumber(ARGV[4]) + seq)
redis.call('HSET', KEYS[2], ARGV[1], ARGV[2])
redis.call('ZADD', KEYS[1], score, ARGV[1])
return 1
"#;

/// Redis-backed job queue.
pub struct RedisJobQueue {
    client: redis::Client,
    keys: QueueKeys,
}

impl RedisJobQueue {
    /// Create a queue over an existing client.
    pub fn new(client: redis::Client, keys: QueueKeys) -> Self {
        Self { client, keys }
    }

    /// Create from a config.
    pub fn from_config(config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self::new(client, config.keys()))
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::from_config(&QueueConfig::from_env())
    }

    /// Key builder in use.
    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, descriptor: JobDescriptor) -> QueueResult<QueueEntry> {
        descriptor.validate()?;

        let mut conn = self.connection().await?;
        let entry = QueueEntry::new(descriptor);
        let payload = serde_json::to_string(&entry)?;

        let inserted: i32 = Script::new(ENQUEUE_SCRIPT)
            .key(self.keys.pending())
            .key(self.keys.entries())
            .key(self.keys.sequence())
            .arg(entry.job_id().as_str())
            .arg(&payload)
            .arg(entry.score())
            .arg(SEQUENCE_SLOTS)
            .invoke_async(&mut conn)
            .await?;

        if inserted == 0 {
            warn!(job_id = %entry.job_id(), "Duplicate job rejected");
            return Err(QueueError::DuplicateJob(entry.job_id().clone()));
        }

        info!(job_id = %entry.job_id(), "Enqueued job");
        Ok(entry)
    }

    async fn scan_pending(&self, limit: usize) -> QueueResult<Vec<QueueEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;

        let ids: Vec<String> = redis::cmd("ZRANGE")
            .arg(self.keys.pending())
            .arg(0)
            .arg(limit as isize - 1)
            .query_async(&mut conn)
            .await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let payloads: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(self.keys.entries())
            .arg(&ids)
            .query_async(&mut conn)
            .await?;

        let mut entries = Vec::with_capacity(ids.len());
        for (id, payload) in ids.into_iter().zip(payloads) {
            // Removed between ZRANGE and HMGET
            let Some(payload) = payload else {
                continue;
            };
            match serde_json::from_str::<QueueEntry>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(job_id = %id, "Dropping malformed queue entry: {}", e);
                    self.remove(&JobId::from_string(id)).await.ok();
                }
            }
        }

        debug!("Scanned {} pending entries", entries.len());
        Ok(entries)
    }

    async fn get(&self, job_id: &JobId) -> QueueResult<Option<QueueEntry>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.hget(self.keys.entries(), job_id.as_str()).await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(QueueError::from))
            .transpose()
    }

    async fn remove(&self, job_id: &JobId) -> QueueResult<bool> {
        let mut conn = self.connection().await?;

        let (deleted, _): (i64, i64) = redis::pipe()
            .atomic()
            .cmd("HDEL")
            .arg(self.keys.entries())
            .arg(job_id.as_str())
            .cmd("ZREM")
            .arg(self.keys.pending())
            .arg(job_id.as_str())
            .query_async(&mut conn)
            .await?;

        debug!(job_id = %job_id, removed = deleted > 0, "Removed queue entry");
        Ok(deleted > 0)
    }

    async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.connection().await?;
        let len: u64 = conn.zcard(self.keys.pending()).await?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.namespace, "avenc:encoder");
        assert_eq!(config.status_ttl, Duration::from_secs(86_400));
        assert_eq!(config.keys().pending(), "avenc:encoder:queue");
    }
}
