//! Encoding worker.
//!
//! This crate provides:
//! - Dispatcher loop: scan, claim, process, clean up
//! - Encoding pipeline with status publication
//! - Worker pool with graceful shutdown
//! - HTTP object transfer and per-job working areas

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod retry;
pub mod transfer;
pub mod working_area;

pub use config::WorkerConfig;
pub use dispatcher::{Dispatcher, DispatcherConfig, PollOutcome};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use pipeline::EncodingPipeline;
pub use pool::WorkerPool;
pub use transfer::HttpTransfer;
pub use working_area::WorkingArea;
