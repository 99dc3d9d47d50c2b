//! Startup probe: verifies the worker's environment before it takes jobs.

use std::path::Path;
use std::process::Command;

use avenc_media::{check_ffmpeg, check_ffprobe};
use avenc_queue::QueueConfig;
use avenc_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env();
    config.validate()?;

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;

    let ffmpeg = match &config.ffmpeg_path {
        Some(path) => path.clone(),
        None => check_ffmpeg()?,
    };
    ensure_runs(&ffmpeg)?;

    let ffprobe = match &config.ffprobe_path {
        Some(path) => Some(path.clone()),
        None => check_ffprobe().ok(),
    };
    match ffprobe {
        Some(path) => ensure_runs(&path)?,
        None => println!("worker-selfcheck: ffprobe missing, progress limited to completion"),
    }

    ensure_redis(&QueueConfig::from_env()).await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

/// The work dir must exist and accept new directories.
async fn ensure_workdir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = tempfile::Builder::new().prefix("selfcheck-").tempdir_in(path)?;
    probe.close()?;
    Ok(())
}

fn ensure_runs(binary: &Path) -> anyhow::Result<()> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", binary.display(), e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            binary.display(),
            output.status
        ));
    }
    Ok(())
}

async fn ensure_redis(config: &QueueConfig) -> anyhow::Result<()> {
    let client = redis::Client::open(config.redis_url.as_str())?;
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| anyhow::anyhow!("redis unreachable: {}", e))?;
    let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
    if pong != "PONG" {
        return Err(anyhow::anyhow!("unexpected PING reply: {}", pong));
    }
    Ok(())
}
