//! Prometheus metrics for the worker.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Install the Prometheus recorder with an HTTP listener on `port`.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("Failed to install Prometheus exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_FINISHED_TOTAL: &str = "avenc_jobs_finished_total";
    pub const JOBS_FAILED_TOTAL: &str = "avenc_jobs_failed_total";
    pub const CLAIMS_WON_TOTAL: &str = "avenc_claims_won_total";
    pub const CLAIMS_LOST_TOTAL: &str = "avenc_claims_lost_total";
    pub const IDLE_POLLS_TOTAL: &str = "avenc_idle_polls_total";

    pub const PIPELINE_DURATION_SECONDS: &str = "avenc_pipeline_duration_seconds";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "avenc_download_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "avenc_upload_duration_seconds";
}

pub fn record_job_finished(duration: Duration) {
    counter!(names::JOBS_FINISHED_TOTAL).increment(1);
    histogram!(names::PIPELINE_DURATION_SECONDS).record(duration.as_secs_f64());
}

pub fn record_job_failed(stage: &'static str, duration: Duration) {
    counter!(names::JOBS_FAILED_TOTAL, "stage" => stage).increment(1);
    histogram!(names::PIPELINE_DURATION_SECONDS).record(duration.as_secs_f64());
}

pub fn record_claim_won() {
    counter!(names::CLAIMS_WON_TOTAL).increment(1);
}

pub fn record_claim_lost() {
    counter!(names::CLAIMS_LOST_TOTAL).increment(1);
}

pub fn record_idle_poll() {
    counter!(names::IDLE_POLLS_TOTAL).increment(1);
}

pub fn record_download_duration(duration: Duration) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration.as_secs_f64());
}

pub fn record_upload_duration(duration: Duration) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration.as_secs_f64());
}
