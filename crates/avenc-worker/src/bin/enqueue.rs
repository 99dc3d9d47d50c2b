//! Producer CLI: submit an encoding job and optionally follow its status.

use std::process::ExitCode;

use clap::Parser;
use futures_util::StreamExt;
use tracing::{error, info};

use avenc_models::{EncodingStatus, JobDescriptor, StatusEvent};
use avenc_queue::{JobQueue, QueueConfig, RedisJobQueue, RedisStatusChannel, StatusChannel};
use avenc_worker::init_tracing;

/// Submit an encoding job to the avenc queue.
#[derive(Parser, Debug)]
#[command(name = "avenc-enqueue")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pre-signed URL to read the source from
    #[arg(long)]
    source_url: String,

    /// Source format, used as the downloaded file's suffix (e.g. "ogg")
    #[arg(long)]
    source_format: String,

    /// Pre-signed URL to PUT the result to
    #[arg(long)]
    destination_url: String,

    /// Output format (e.g. "mp3")
    #[arg(long)]
    output_format: String,

    /// Audio bitrate in kbit/s
    #[arg(long)]
    bitrate: Option<u32>,

    /// Job ID; generated when omitted
    #[arg(long)]
    id: Option<String>,

    /// Print status events until the job finishes or fails
    #[arg(short, long, default_value_t = false)]
    follow: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    match run(args).await {
        Ok(code) => code,
        Err(error) => {
            error!("{:#}", error);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config = QueueConfig::from_env();
    let client = redis::Client::open(config.redis_url.as_str())?;
    let queue = RedisJobQueue::new(client.clone(), config.keys());
    let status = RedisStatusChannel::new(client, config.keys(), config.status_ttl);

    let mut descriptor = JobDescriptor::new(
        args.source_url,
        args.source_format,
        args.destination_url,
        args.output_format,
    )
    .with_bitrate(args.bitrate);
    if let Some(id) = args.id {
        descriptor = descriptor.with_id(id);
    }
    let job_id = descriptor.id.clone();

    // Subscribe before enqueueing so no event is missed
    let live = if args.follow {
        Some(status.subscribe(&job_id).await?)
    } else {
        None
    };

    match queue.enqueue(descriptor).await {
        Ok(entry) => info!(job_id = %job_id, enqueued_at = %entry.enqueued_at, "Job enqueued"),
        Err(e) if e.is_duplicate() => info!(job_id = %job_id, "Job already queued"),
        Err(e) => return Err(e.into()),
    }
    println!("{}", job_id);

    let Some(mut live) = live else {
        return Ok(ExitCode::SUCCESS);
    };

    // Replay what was published before the subscription caught up
    let mut last_seen = None;
    for event in status.history(&job_id).await? {
        print_event(&event);
        last_seen = Some(event.at);
        if event.is_terminal() {
            return Ok(exit_code_for(&event));
        }
    }

    while let Some(event) = live.next().await {
        if last_seen.is_some_and(|at| event.at <= at) {
            continue;
        }
        print_event(&event);
        if event.is_terminal() {
            return Ok(exit_code_for(&event));
        }
    }

    anyhow::bail!("status subscription for {} closed before a terminal event", job_id)
}

fn print_event(event: &StatusEvent) {
    println!("{}  {}", event.at.to_rfc3339(), event.status);
}

fn exit_code_for(event: &StatusEvent) -> ExitCode {
    match event.status {
        EncodingStatus::Finished => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
