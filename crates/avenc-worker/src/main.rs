//! Encoding worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use avenc_media::FfmpegTranscoder;
use avenc_queue::{QueueConfig, RedisClaimStore, RedisJobQueue, RedisStatusChannel};
use avenc_worker::{
    init_tracing, metrics, DispatcherConfig, EncodingPipeline, HttpTransfer, WorkerConfig,
    WorkerPool,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting avenc-worker");

    let config = WorkerConfig::from_env();
    config.validate()?;
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        metrics::init_metrics(port)?;
        info!("Prometheus metrics listening on port {}", port);
    }

    let queue_config = QueueConfig::from_env();
    let client = redis::Client::open(queue_config.redis_url.as_str())
        .context("Failed to create Redis client")?;
    let keys = queue_config.keys();

    let queue = Arc::new(RedisJobQueue::new(client.clone(), keys.clone()));
    let claims = Arc::new(RedisClaimStore::new(client.clone(), keys.clone(), config.claim_lease));
    let status = Arc::new(RedisStatusChannel::new(client, keys, queue_config.status_ttl));

    let transcoder = FfmpegTranscoder::locate(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
        .context("ffmpeg is required")?;
    info!("Using ffmpeg at {}", transcoder.ffmpeg().display());

    let pipeline = Arc::new(EncodingPipeline::new(
        config.work_dir.clone(),
        HttpTransfer::new()?,
        Arc::new(transcoder),
        status,
    ));

    let pool = WorkerPool::start(
        config.worker_count,
        queue,
        claims,
        pipeline,
        DispatcherConfig::from(&config),
        config.shutdown_timeout,
    );

    shutdown_signal().await;

    if !pool.shutdown().await {
        warn!("Exited with jobs still in flight");
    }
    info!("Worker shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Received shutdown signal");
}
