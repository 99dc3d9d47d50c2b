//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of dispatcher instances in this process
    pub worker_count: usize,
    /// Root under which per-job working areas are created
    pub work_dir: PathBuf,
    /// Maximum entries fetched per queue scan
    pub scan_batch: usize,
    /// Initial wait after a poll that found no winnable work
    pub idle_backoff: Duration,
    /// Upper bound for the idle wait
    pub max_idle_backoff: Duration,
    /// Claim lease; an unrenewed claim expires after this
    pub claim_lease: Duration,
    /// How often a running job renews its claim
    pub heartbeat_interval: Duration,
    /// Graceful shutdown timeout for in-flight jobs
    pub shutdown_timeout: Duration,
    /// ffmpeg binary, resolved from PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
    /// ffprobe binary, resolved from PATH when unset
    pub ffprobe_path: Option<PathBuf>,
    /// Port for the Prometheus listener
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            work_dir: std::env::temp_dir().join("avenc"),
            scan_batch: 100,
            idle_backoff: Duration::from_millis(500),
            max_idle_backoff: Duration::from_secs(5),
            claim_lease: Duration::from_secs(300), // 5 minutes
            heartbeat_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(600),
            ffmpeg_path: None,
            ffprobe_path: None,
            metrics_port: None,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: env_parse("WORKER_COUNT").unwrap_or(defaults.worker_count),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            scan_batch: env_parse("WORKER_SCAN_BATCH").unwrap_or(defaults.scan_batch),
            idle_backoff: env_parse("WORKER_IDLE_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_backoff),
            max_idle_backoff: env_parse("WORKER_MAX_IDLE_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_idle_backoff),
            claim_lease: env_parse("WORKER_CLAIM_LEASE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.claim_lease),
            heartbeat_interval: env_parse("WORKER_HEARTBEAT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_interval),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            ffmpeg_path: std::env::var("PATH_TO_FFMPEG").ok().map(PathBuf::from),
            ffprobe_path: std::env::var("PATH_TO_FFPROBE").ok().map(PathBuf::from),
            metrics_port: env_parse("METRICS_PORT"),
        }
    }

    /// Reject settings the worker cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.worker_count == 0 {
            return Err(WorkerError::config_error("WORKER_COUNT must be at least 1"));
        }
        if self.scan_batch == 0 {
            return Err(WorkerError::config_error("WORKER_SCAN_BATCH must be at least 1"));
        }
        if self.heartbeat_interval.is_zero() || self.heartbeat_interval >= self.claim_lease {
            return Err(WorkerError::config_error(format!(
                "heartbeat interval ({:?}) must be non-zero and shorter than the claim lease ({:?})",
                self.heartbeat_interval, self.claim_lease
            )));
        }
        if self.idle_backoff > self.max_idle_backoff {
            return Err(WorkerError::config_error(
                "WORKER_IDLE_BACKOFF_MS exceeds WORKER_MAX_IDLE_BACKOFF_MS",
            ));
        }
        Ok(())
    }
}
