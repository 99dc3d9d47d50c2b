//! Queue entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use avenc_models::{JobDescriptor, JobId};

/// A job descriptor plus its enqueue time.
///
/// The entry lives until the job reaches a terminal state; receiving it is
/// not enough to remove it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// The job to process
    pub descriptor: JobDescriptor,
    /// Enqueue time, the ordering key
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Create an entry stamped with the current time.
    pub fn new(descriptor: JobDescriptor) -> Self {
        Self {
            descriptor,
            enqueued_at: Utc::now(),
        }
    }

    /// Job ID of the entry.
    pub fn job_id(&self) -> &JobId {
        &self.descriptor.id
    }

    /// Ordering score (milliseconds since the epoch).
    pub fn score(&self) -> i64 {
        self.enqueued_at.timestamp_millis()
    }
}
