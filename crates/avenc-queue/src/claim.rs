//! Claim store: at most one active owner per job.
//!
//! Claims are leases. The owner renews them while it works; a claim whose
//! owner died expires and the job becomes claimable again.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use tracing::debug;

use avenc_models::JobId;

use crate::error::{QueueError, QueueResult};
use crate::keys::QueueKeys;

/// Default claim lease (5 minutes).
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(300);

/// Atomic claim-if-absent markers keyed by job ID.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Create the marker only if absent. Returns whether this call created it.
    async fn try_claim(&self, job_id: &JobId, owner: &str) -> QueueResult<bool>;

    /// Extend the lease. Returns `false` if `owner` no longer holds the claim.
    async fn renew(&self, job_id: &JobId, owner: &str) -> QueueResult<bool>;

    /// Remove the marker if `owner` holds it. Idempotent.
    async fn release(&self, job_id: &JobId, owner: &str) -> QueueResult<()>;

    /// Current owner, if claimed.
    async fn owner(&self, job_id: &JobId) -> QueueResult<Option<String>>;
}

const RENEW_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
else
    return 0
end
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

/// Redis-backed claim store using `SET NX PX`.
pub struct RedisClaimStore {
    client: redis::Client,
    keys: QueueKeys,
    lease: Duration,
}

impl RedisClaimStore {
    /// Create a claim store with the given lease.
    pub fn new(client: redis::Client, keys: QueueKeys, lease: Duration) -> Self {
        Self {
            client,
            keys,
            lease,
        }
    }

    fn lease_ms(&self) -> u64 {
        (self.lease.as_millis() as u64).max(1)
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }
}

#[async_trait]
impl ClaimStore for RedisClaimStore {
    async fn try_claim(&self, job_id: &JobId, owner: &str) -> QueueResult<bool> {
        let mut conn = self.connection().await?;
        let key = self.keys.claim(job_id);

        // SET key owner NX PX lease
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(self.lease_ms())
            .query_async(&mut conn)
            .await?;

        let acquired = result.is_some();
        debug!(claim_key = %key, owner, acquired, "Claim attempt");
        Ok(acquired)
    }

    async fn renew(&self, job_id: &JobId, owner: &str) -> QueueResult<bool> {
        let mut conn = self.connection().await?;
        let renewed: i32 = Script::new(RENEW_SCRIPT)
            .key(self.keys.claim(job_id))
            .arg(owner)
            .arg(self.lease_ms())
            .invoke_async(&mut conn)
            .await?;
        Ok(renewed == 1)
    }

    async fn release(&self, job_id: &JobId, owner: &str) -> QueueResult<()> {
        let mut conn = self.connection().await?;
        let key = self.keys.claim(job_id);
        let _deleted: i32 = Script::new(RELEASE_SCRIPT)
            .key(&key)
            .arg(owner)
            .invoke_async(&mut conn)
            .await?;

        debug!(claim_key = %key, "Released claim");
        Ok(())
    }

    async fn owner(&self, job_id: &JobId) -> QueueResult<Option<String>> {
        let mut conn = self.connection().await?;
        let owner: Option<String> = conn.get(self.keys.claim(job_id)).await?;
        Ok(owner)
    }
}
