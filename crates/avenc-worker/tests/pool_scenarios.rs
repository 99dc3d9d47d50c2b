//! Multi-worker scenarios through `WorkerPool`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use wiremock::MockServer;

use avenc_models::{EncodingStatus, JobId};
use avenc_queue::{JobQueue, MemoryClaimStore, MemoryJobQueue, MemoryStatusChannel, StatusChannel};
use avenc_worker::WorkerPool;

use common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hundred_jobs_five_workers_each_processed_once() {
    let server = MockServer::start().await;
    let work_dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(MemoryJobQueue::new());
    let claims = Arc::new(MemoryClaimStore::default());
    let status = Arc::new(MemoryStatusChannel::new());
    let transcoder = Arc::new(ScriptedTranscoder::new(vec![0.5]));

    let ids: Vec<String> = (0..100).map(|n| format!("job-{:03}", n)).collect();
    for id in &ids {
        mount_job(&server, id).await;
        queue.enqueue(descriptor(id, &server)).await.unwrap();
    }

    let pool = WorkerPool::start(
        5,
        queue.clone(),
        claims,
        pipeline(work_dir.path(), transcoder.clone(), status.clone()),
        fast_config(),
        Duration::from_secs(30),
    );
    assert_eq!(pool.size(), 5);

    let drained = wait_until(Duration::from_secs(60), || {
        let queue = queue.clone();
        async move { queue.len().await.unwrap() == 0 }
    })
    .await;
    assert!(pool.shutdown().await);
    assert!(drained, "queue not drained");

    for id in &ids {
        let history = status.history(&JobId::from(id.as_str())).await.unwrap();
        let terminal: Vec<_> = history.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1, "{} terminal events: {:?}", id, terminal);
        assert_eq!(history.last().map(|e| e.status), Some(EncodingStatus::Finished));
        assert_eq!(
            history.iter().filter(|e| e.status == EncodingStatus::Reading).count(),
            1,
            "{} read more than once",
            id
        );
    }

    let calls = transcoder.calls_by_input.lock().unwrap().clone();
    assert_eq!(calls.len(), 100);
    assert!(calls.values().all(|&n| n == 1), "job transcoded twice: {:?}", calls);
    assert!(is_empty_dir(work_dir.path()));
}

#[tokio::test]
async fn test_shutdown_lets_in_flight_job_finish() {
    let server = MockServer::start().await;
    let work_dir = tempfile::tempdir().unwrap();
    let queue = Arc::new(MemoryJobQueue::new());
    let status = Arc::new(MemoryStatusChannel::new());
    let transcoder =
        Arc::new(ScriptedTranscoder::new(vec![0.1]).with_delay(Duration::from_millis(400)));

    for id in ["job-1", "job-2"] {
        mount_job(&server, id).await;
        queue.enqueue(descriptor(id, &server)).await.unwrap();
    }

    let pool = WorkerPool::start(
        1,
        queue.clone(),
        Arc::new(MemoryClaimStore::default()),
        pipeline(work_dir.path(), transcoder.clone(), status.clone()),
        fast_config(),
        Duration::from_secs(30),
    );

    let started = wait_until(Duration::from_secs(10), || {
        let status = status.clone();
        async move {
            history_of(&status, "job-1")
                .await
                .contains(&EncodingStatus::Encoding { percent: 10 })
        }
    })
    .await;
    assert!(started, "job-1 never started encoding");

    assert!(pool.shutdown().await);

    assert_eq!(
        history_of(&status, "job-1").await.last(),
        Some(&EncodingStatus::Finished)
    );
    assert!(queue.get(&JobId::from("job-1")).await.unwrap().is_none());

    // Not picked up after the stop signal
    assert!(queue.get(&JobId::from("job-2")).await.unwrap().is_some());
    assert!(history_of(&status, "job-2").await.is_empty());
    assert!(is_empty_dir(work_dir.path()));
}

#[tokio::test]
async fn test_idle_pool_stops_promptly() {
    let work_dir = tempfile::tempdir().unwrap();
    let mut config = fast_config();
    config.idle_backoff = Duration::from_secs(5);
    config.max_idle_backoff = Duration::from_secs(5);

    let pool = WorkerPool::start(
        3,
        Arc::new(MemoryJobQueue::new()),
        Arc::new(MemoryClaimStore::default()),
        pipeline(
            work_dir.path(),
            Arc::new(ScriptedTranscoder::default()),
            Arc::new(MemoryStatusChannel::new()),
        ),
        config,
        Duration::from_secs(30),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stopped = tokio::time::timeout(Duration::from_secs(2), pool.shutdown()).await;
    assert_eq!(stopped.ok(), Some(true));
}
