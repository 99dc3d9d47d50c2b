//! Redis key layout.
//!
//! Every key lives under a namespace passed in at construction, so several
//! independent queues can share one Redis instance.

use avenc_models::JobId;

/// Default namespace for the encoder queue.
pub const DEFAULT_NAMESPACE: &str = "avenc:encoder";

/// Key builder for one queue namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    namespace: String,
}

impl QueueKeys {
    /// Create a key builder for a namespace (trailing `:` is trimmed).
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            namespace: namespace.trim_end_matches(':').to_string(),
        }
    }

    /// The namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Sorted set of pending job IDs scored by enqueue time and sequence.
    pub fn pending(&self) -> String {
        format!("{}:queue", self.namespace)
    }

    /// Counter breaking ties between jobs enqueued in the same millisecond.
    pub fn sequence(&self) -> String {
        format!("{}:seq", self.namespace)
    }

    /// Hash of job ID -> serialized queue entry.
    pub fn entries(&self) -> String {
        format!("{}:entries", self.namespace)
    }

    /// Claim marker for a job.
    pub fn claim(&self, job_id: &JobId) -> String {
        format!("{}:claim:{}", self.namespace, job_id)
    }

    /// Status history stream for a job.
    pub fn events(&self, job_id: &JobId) -> String {
        format!("{}:events:{}", self.namespace, job_id)
    }

    /// Pub/Sub channel carrying live status events for a job.
    pub fn events_channel(&self, job_id: &JobId) -> String {
        format!("{}:events_live:{}", self.namespace, job_id)
    }
}

impl Default for QueueKeys {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
