//! Shared data models for the avenc encoding queue.
//!
//! This crate provides Serde-serializable types for:
//! - Job descriptors and identifiers
//! - Encoding parameters
//! - Status events published while a job is processed

pub mod encoding;
pub mod error;
pub mod job;
pub mod status;

// Re-export common types
pub use encoding::EncodingParams;
pub use error::{ModelError, ModelResult};
pub use job::{JobDescriptor, JobId};
pub use status::{EncodingStatus, StatusEvent};
