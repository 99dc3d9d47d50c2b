//! Shared fixtures for worker scenario tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use avenc_media::{MediaError, MediaResult, ProgressFn, TranscodeRequest, Transcoder};
use avenc_models::{EncodingStatus, JobDescriptor, StatusEvent};
use avenc_queue::{ClaimStore, JobQueue, MemoryStatusChannel, StatusChannel};
use avenc_worker::{Dispatcher, DispatcherConfig, EncodingPipeline, HttpTransfer};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Transcoder that reports a fixed progress script and writes a stub output.
///
/// Invocations are counted by the content of the input file, so tests can
/// serve each job a body naming it.
#[derive(Default)]
pub struct ScriptedTranscoder {
    pub fractions: Vec<f64>,
    pub fail: bool,
    pub delay: Duration,
    pub requests: Mutex<Vec<TranscodeRequest>>,
    pub calls_by_input: Mutex<HashMap<String, usize>>,
}

impl ScriptedTranscoder {
    pub fn new(fractions: Vec<f64>) -> Self {
        Self {
            fractions,
            ..Default::default()
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcoder for ScriptedTranscoder {
    async fn transcode(&self, request: &TranscodeRequest, progress: ProgressFn) -> MediaResult<()> {
        self.requests.lock().unwrap().push(request.clone());

        let input = tokio::fs::read(&request.input).await?;
        *self
            .calls_by_input
            .lock()
            .unwrap()
            .entry(String::from_utf8_lossy(&input).into_owned())
            .or_default() += 1;

        for fraction in &self.fractions {
            progress(*fraction);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail {
            return Err(MediaError::ffmpeg_failed("scripted failure", None, Some(1)));
        }
        tokio::fs::write(&request.output, b"encoded output").await?;
        Ok(())
    }
}

pub fn fast_config() -> DispatcherConfig {
    DispatcherConfig {
        scan_batch: 100,
        idle_backoff: Duration::from_millis(5),
        max_idle_backoff: Duration::from_millis(20),
        heartbeat_interval: Duration::from_secs(1),
        claim_lease: Duration::from_secs(300),
    }
}

pub fn pipeline(
    work_dir: &Path,
    transcoder: Arc<ScriptedTranscoder>,
    status: Arc<MemoryStatusChannel>,
) -> Arc<EncodingPipeline> {
    Arc::new(EncodingPipeline::new(
        work_dir,
        HttpTransfer::new().unwrap(),
        transcoder,
        status,
    ))
}

pub fn dispatcher(
    worker_id: &str,
    queue: Arc<dyn JobQueue>,
    claims: Arc<dyn ClaimStore>,
    pipeline: Arc<EncodingPipeline>,
    config: DispatcherConfig,
) -> Dispatcher {
    Dispatcher::new(worker_id, queue, claims, pipeline, config)
}

/// `ogg -> mp3 @128` job reading from and writing to the mock server.
pub fn descriptor(id: &str, server: &MockServer) -> JobDescriptor {
    JobDescriptor::new(
        format!("{}/sources/{}.ogg?sig=abc", server.uri(), id),
        "ogg",
        format!("{}/results/{}.mp3?sig=def", server.uri(), id),
        "mp3",
    )
    .with_id(id)
    .with_bitrate(Some(128))
}

/// Serve a source whose body is the job ID and accept its upload.
pub async fn mount_job(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/sources/{}.ogg", id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(id.as_bytes().to_vec()))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/results/{}.mp3", id)))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

pub fn statuses(history: &[StatusEvent]) -> Vec<EncodingStatus> {
    history.iter().map(|e| e.status).collect()
}

pub async fn history_of(status: &MemoryStatusChannel, id: &str) -> Vec<EncodingStatus> {
    statuses(&status.history(&id.into()).await.unwrap())
}

pub fn is_empty_dir(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
