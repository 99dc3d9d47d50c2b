//! Worker pool: N dispatchers sharing one queue, claim store and pipeline.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use avenc_queue::{ClaimStore, JobQueue};

use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::pipeline::EncodingPipeline;

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Spawn `count` dispatchers. Worker IDs are unique per process
    /// (`worker-<uuid>-<n>`) so claims from different processes never alias.
    pub fn start(
        count: usize,
        queue: Arc<dyn JobQueue>,
        claims: Arc<dyn ClaimStore>,
        pipeline: Arc<EncodingPipeline>,
        config: DispatcherConfig,
        shutdown_timeout: Duration,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let instance = Uuid::new_v4().simple().to_string();

        let handles = (0..count)
            .map(|n| {
                let dispatcher = Dispatcher::new(
                    format!("worker-{}-{}", &instance[..8], n),
                    Arc::clone(&queue),
                    Arc::clone(&claims),
                    Arc::clone(&pipeline),
                    config.clone(),
                );
                let token = shutdown.child_token();
                tokio::spawn(async move { dispatcher.run(token).await })
            })
            .collect();

        info!("Started worker pool with {} workers", count);
        Self {
            handles,
            shutdown,
            shutdown_timeout,
        }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Stop polling and wait for in-flight jobs.
    ///
    /// Returns `false` if jobs were still running at the timeout; their
    /// claims lapse and the jobs are re-offered.
    pub async fn shutdown(self) -> bool {
        info!("Stopping worker pool, waiting for in-flight jobs...");
        self.shutdown.cancel();

        match tokio::time::timeout(self.shutdown_timeout, join_all(self.handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!("Worker task failed: {}", e);
                    }
                }
                info!("Worker pool stopped");
                true
            }
            Err(_) => {
                error!(
                    "Worker pool did not stop within {:?}, abandoning in-flight jobs",
                    self.shutdown_timeout
                );
                false
            }
        }
    }
}
