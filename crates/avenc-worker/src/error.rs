//! Worker error types.

use avenc_media::MediaError;
use avenc_queue::QueueError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The per-job working area could not be created.
    #[error("Working area unavailable: {0}")]
    WorkingArea(#[source] std::io::Error),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(#[from] MediaError),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Neither `finished` nor `error` could be recorded for the job.
    #[error("Terminal status not recorded: {0}")]
    TerminalStatus(#[source] QueueError),
}

impl WorkerError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Stage that failed, used as a log field and metrics label.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkerError::WorkingArea(_) => "working_area",
            WorkerError::DownloadFailed(_) => "download",
            WorkerError::EncodingFailed(_) => "encoding",
            WorkerError::UploadFailed(_) => "upload",
            WorkerError::ConfigError(_) => "config",
            WorkerError::Queue(_) => "queue",
            WorkerError::TerminalStatus(_) => "status",
        }
    }

    /// Errors that end a job with an `error` status. Anything else leaves
    /// the job without a terminal status.
    pub fn is_pipeline_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::WorkingArea(_)
                | WorkerError::DownloadFailed(_)
                | WorkerError::EncodingFailed(_)
                | WorkerError::UploadFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        assert_eq!(WorkerError::download_failed("x").stage(), "download");
        assert_eq!(WorkerError::upload_failed("x").stage(), "upload");
        assert_eq!(
            WorkerError::from(MediaError::internal("x")).stage(),
            "encoding"
        );
        assert!(WorkerError::download_failed("x").is_pipeline_fatal());
        assert!(!WorkerError::config_error("x").is_pipeline_fatal());

        let lost = WorkerError::TerminalStatus(QueueError::connection_failed("down"));
        assert_eq!(lost.stage(), "status");
        assert!(!lost.is_pipeline_fatal());
    }
}
