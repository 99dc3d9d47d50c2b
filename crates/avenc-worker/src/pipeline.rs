//! Encoding pipeline: download, transcode, upload.
//!
//! Status progression for one execution:
//!
//! ```text
//! reading -> encoding(0) -> encoding(..)* -> encoding(100) -> writing -> finished
//!    \___________________________ error ___________________________/
//! ```
//!
//! Exactly one terminal event is published per execution and it is always
//! the last one; when it cannot be recorded the run fails with
//! `TerminalStatus`. The working area is removed on every path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use avenc_media::{ProgressFn, TranscodeRequest, Transcoder};
use avenc_models::{EncodingStatus, JobDescriptor, JobId, StatusEvent};
use avenc_queue::{QueueResult, StatusChannel};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};
use crate::transfer::HttpTransfer;
use crate::working_area::WorkingArea;

/// Runs one job through download, transcode and upload.
pub struct EncodingPipeline {
    work_dir: PathBuf,
    transfer: HttpTransfer,
    transcoder: Arc<dyn Transcoder>,
    status: Arc<dyn StatusChannel>,
}

impl EncodingPipeline {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        transfer: HttpTransfer,
        transcoder: Arc<dyn Transcoder>,
        status: Arc<dyn StatusChannel>,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            transfer,
            transcoder,
            status,
        }
    }

    /// Execute the job and publish its terminal status.
    ///
    /// Pipeline failures are returned after the `error` event is published;
    /// the caller still owns queue and claim cleanup. If the terminal event
    /// itself cannot be recorded the result is
    /// [`WorkerError::TerminalStatus`] and the job must stay queued.
    pub async fn run(&self, descriptor: &JobDescriptor, logger: &JobLogger) -> WorkerResult<()> {
        let result = self.execute(descriptor, logger).await;

        let terminal = match &result {
            Ok(()) => EncodingStatus::Finished,
            Err(e) => {
                logger.log_error(e);
                EncodingStatus::Error
            }
        };
        if let Err(e) = self.publish_terminal(&descriptor.id, terminal).await {
            logger.log_warning(&format!("Terminal {} status not recorded: {}", terminal, e));
            return Err(WorkerError::TerminalStatus(e));
        }

        result
    }

    async fn execute(&self, descriptor: &JobDescriptor, logger: &JobLogger) -> WorkerResult<()> {
        let area = WorkingArea::create(&self.work_dir).await?;
        self.publish(&descriptor.id, EncodingStatus::Reading, logger).await;

        let result = self.stages(descriptor, &area, logger).await;

        if let Err(e) = area.destroy().await {
            logger.log_warning(&format!("Failed to remove working area: {}", e));
        }
        result
    }

    async fn stages(
        &self,
        descriptor: &JobDescriptor,
        area: &WorkingArea,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        let job_id = &descriptor.id;

        // Reading
        logger.log_stage("reading");
        let source = area.source_path(&descriptor.source_format_hint);
        let started = Instant::now();
        let bytes = self.transfer.download(&descriptor.source_url, &source).await?;
        metrics::record_download_duration(started.elapsed());
        logger.log_progress(&format!("downloaded {} bytes", bytes));

        // Encoding
        logger.log_stage("encoding");
        self.publish(job_id, EncodingStatus::Encoding { percent: 0 }, logger).await;
        let params = descriptor.encoding_params();
        let output = area.output_path(&params);
        self.transcode(job_id, TranscodeRequest::new(source, &output, params), logger)
            .await?;
        self.publish(job_id, EncodingStatus::Encoding { percent: 100 }, logger).await;

        // Writing
        logger.log_stage("writing");
        self.publish(job_id, EncodingStatus::Writing, logger).await;
        let started = Instant::now();
        let bytes = self.transfer.upload(&output, &descriptor.destination_url).await?;
        metrics::record_upload_duration(started.elapsed());
        logger.log_progress(&format!("uploaded {} bytes", bytes));

        Ok(())
    }

    /// Run the transcoder, relaying each progress fraction as an
    /// `encoding` event in the order reported.
    async fn transcode(
        &self,
        job_id: &JobId,
        request: TranscodeRequest,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let progress: ProgressFn = Box::new(move |fraction: f64| {
            let _ = tx.send(fraction);
        });

        // The relay ends once the transcoder drops its progress sender
        let transcode = self.transcoder.transcode(&request, progress);
        let relay = async {
            while let Some(fraction) = rx.recv().await {
                self.publish(job_id, EncodingStatus::encoding_fraction(fraction), logger)
                    .await;
            }
        };

        let (result, ()) = tokio::join!(transcode, relay);
        result.map_err(WorkerError::EncodingFailed)
    }

    /// Best-effort publication of a non-terminal event.
    async fn publish(&self, job_id: &JobId, status: EncodingStatus, logger: &JobLogger) {
        if let Err(e) = self.status.publish(job_id, status).await {
            logger.log_warning(&format!("Failed to publish {} status: {}", status, e));
        }
    }

    async fn publish_terminal(&self, job_id: &JobId, status: EncodingStatus) -> QueueResult<StatusEvent> {
        let retry = RetryConfig::new("publish_terminal_status");
        retry_async(&retry, || self.status.publish(job_id, status)).await
    }
}
