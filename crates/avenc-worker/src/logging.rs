//! Structured logging.
//!
//! [`init_tracing`] sets up the subscriber for the binaries; [`JobLogger`]
//! keeps job lifecycle events consistently tagged with job and worker IDs.

use std::time::Duration;

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use avenc_models::JobId;

use crate::error::WorkerError;

const DEFAULT_FILTER: &str =
    "warn,avenc_worker=info,avenc_queue=info,avenc_media=info,avenc_enqueue=info";

/// Install the global subscriber.
///
/// `LOG_FORMAT=json` selects JSON output, otherwise colored text. Filtering
/// follows `RUST_LOG`, defaulting to `info` for the avenc crates.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    worker_id: String,
}

impl JobLogger {
    /// Create a logger for a job handled by `worker_id`.
    pub fn new(job_id: &JobId, worker_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            worker_id: worker_id.to_string(),
        }
    }

    /// Log the start of a job.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            worker_id = %self.worker_id,
            "Job started: {}", message
        );
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, stage: &str) {
        info!(
            job_id = %self.job_id,
            worker_id = %self.worker_id,
            stage,
            "Job stage: {}", stage
        );
    }

    /// Log a progress update during job execution.
    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            worker_id = %self.worker_id,
            "Job progress: {}", message
        );
    }

    /// Log a warning during job execution.
    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            worker_id = %self.worker_id,
            "Job warning: {}", message
        );
    }

    /// Log the error that ended a job.
    pub fn log_error(&self, err: &WorkerError) {
        error!(
            job_id = %self.job_id,
            worker_id = %self.worker_id,
            stage = err.stage(),
            "Job failed: {}", err
        );
    }

    /// Log the completion of a job.
    pub fn log_completion(&self, elapsed: Duration) {
        info!(
            job_id = %self.job_id,
            worker_id = %self.worker_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "Job completed"
        );
    }

    /// Span covering the job's execution.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            worker_id = %self.worker_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::from("job-1");
        let logger = JobLogger::new(&job_id, "worker-a-0");

        assert_eq!(logger.job_id, "job-1");
        assert_eq!(logger.worker_id, "worker-a-0");
    }
}
