//! Status channel: append-only per-job event history.
//!
//! The Redis backend appends each event to a stream (the history) and also
//! publishes it on a Pub/Sub channel for live observers.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tracing::debug;

use avenc_models::{EncodingStatus, JobId, StatusEvent};

use crate::error::{QueueError, QueueResult};
use crate::keys::QueueKeys;

/// Live status events for one job.
pub type StatusStream = Pin<Box<dyn Stream<Item = StatusEvent> + Send>>;

/// Sink for job lifecycle events. Never consulted for control decisions.
#[async_trait]
pub trait StatusChannel: Send + Sync {
    /// Append an event to the job's history.
    async fn publish(&self, job_id: &JobId, status: EncodingStatus) -> QueueResult<StatusEvent>;

    /// Full ordered history for a job.
    async fn history(&self, job_id: &JobId) -> QueueResult<Vec<StatusEvent>>;

    /// Most recent status, `Initial` if nothing was published.
    async fn latest(&self, job_id: &JobId) -> QueueResult<EncodingStatus> {
        Ok(self
            .history(job_id)
            .await?
            .last()
            .map(|event| event.status)
            .unwrap_or_default())
    }

    /// Events published after the subscription is established.
    async fn subscribe(&self, job_id: &JobId) -> QueueResult<StatusStream>;
}

/// Redis-backed status channel.
pub struct RedisStatusChannel {
    client: redis::Client,
    keys: QueueKeys,
    history_ttl: Duration,
}

impl RedisStatusChannel {
    /// Create a status channel.
    pub fn new(client: redis::Client, keys: QueueKeys, history_ttl: Duration) -> Self {
        Self {
            client,
            keys,
            history_ttl,
        }
    }

    async fn connection(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }
}

#[async_trait]
impl StatusChannel for RedisStatusChannel {
    async fn publish(&self, job_id: &JobId, status: EncodingStatus) -> QueueResult<StatusEvent> {
        let mut conn = self.connection().await?;
        let event = StatusEvent::new(job_id.clone(), status);
        let payload = serde_json::to_string(&event)?;
        let stream = self.keys.events(job_id);

        redis::pipe()
            .atomic()
            .cmd("XADD")
            .arg(&stream)
            .arg("*")
            .arg("event")
            .arg(&payload)
            .ignore()
            .cmd("EXPIRE")
            .arg(&stream)
            .arg(self.history_ttl.as_secs().max(1))
            .ignore()
            .cmd("PUBLISH")
            .arg(self.keys.events_channel(job_id))
            .arg(&payload)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(job_id = %job_id, status = %status, "Published status event");
        Ok(event)
    }

    async fn history(&self, job_id: &JobId) -> QueueResult<Vec<StatusEvent>> {
        let mut conn = self.connection().await?;

        let reply: redis::streams::StreamRangeReply = redis::cmd("XRANGE")
            .arg(self.keys.events(job_id))
            .arg("-")
            .arg("+")
            .query_async(&mut conn)
            .await?;

        reply
            .ids
            .iter()
            .filter_map(|entry| entry.get::<String>("event"))
            .map(|payload| serde_json::from_str(&payload).map_err(QueueError::from))
            .collect()
    }

    async fn subscribe(&self, job_id: &JobId) -> QueueResult<StatusStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(self.keys.events_channel(job_id)).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}
