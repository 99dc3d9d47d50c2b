//! Job queue, claim store and status channel for the encoding service.
//!
//! This crate provides:
//! - A durable FIFO of pending encoding jobs
//! - Lease-based claim markers so only one worker processes a job
//! - Per-job status histories with live subscription
//!
//! Redis backends are used in production; the `memory` module holds
//! in-process equivalents with the same contracts.

pub mod claim;
pub mod error;
pub mod job;
pub mod keys;
pub mod memory;
pub mod queue;
pub mod status;

pub use claim::{ClaimStore, RedisClaimStore, DEFAULT_CLAIM_LEASE};
pub use error::{QueueError, QueueResult};
pub use job::QueueEntry;
pub use keys::{QueueKeys, DEFAULT_NAMESPACE};
pub use memory::{MemoryClaimStore, MemoryJobQueue, MemoryStatusChannel};
pub use queue::{JobQueue, QueueConfig, RedisJobQueue, STATUS_HISTORY_TTL_SECS};
pub use status::{RedisStatusChannel, StatusChannel, StatusStream};
