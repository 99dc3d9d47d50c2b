//! Redis backend integration tests.
//!
//! Each test uses its own namespace so runs don't interfere.

use std::time::Duration;

use futures_util::StreamExt;

use avenc_models::{EncodingStatus, JobDescriptor, JobId};
use avenc_queue::{
    ClaimStore, JobQueue, QueueConfig, QueueKeys, RedisClaimStore, RedisJobQueue,
    RedisStatusChannel, StatusChannel,
};

fn client_and_keys() -> (redis::Client, QueueKeys) {
    dotenvy::dotenv().ok();
    let config = QueueConfig::from_env();
    let client = redis::Client::open(config.redis_url.as_str()).expect("Failed to open client");
    let keys = QueueKeys::new(&format!("avenc:test:{}", uuid::Uuid::new_v4()));
    (client, keys)
}

fn descriptor(id: &str) -> JobDescriptor {
    JobDescriptor::new(
        "https://example.com/in.ogg",
        "ogg",
        "https://example.com/out.mp3",
        "mp3",
    )
    .with_id(id)
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_enqueue_scan_remove() {
    let (client, keys) = client_and_keys();
    let queue = RedisJobQueue::new(client, keys);

    queue.enqueue(descriptor("a")).await.expect("enqueue a");
    tokio::time::sleep(Duration::from_millis(5)).await;
    queue.enqueue(descriptor("b")).await.expect("enqueue b");

    let err = queue.enqueue(descriptor("a")).await.unwrap_err();
    assert!(err.is_duplicate());
    assert_eq!(queue.len().await.unwrap(), 2);

    let ids: Vec<String> = queue
        .scan_pending(10)
        .await
        .unwrap()
        .iter()
        .map(|e| e.job_id().to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);

    assert!(queue.remove(&JobId::from("a")).await.unwrap());
    assert!(!queue.remove(&JobId::from("a")).await.unwrap());
    assert!(queue.get(&JobId::from("a")).await.unwrap().is_none());
    assert_eq!(queue.len().await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_burst_enqueue_keeps_insertion_order() {
    let (client, keys) = client_and_keys();
    let queue = RedisJobQueue::new(client, keys);

    // Ids descend so name order and insertion order disagree
    let inserted: Vec<String> = (0..20).rev().map(|n| format!("job-{:02}", n)).collect();
    for id in &inserted {
        queue.enqueue(descriptor(id)).await.expect("enqueue");
    }

    let scanned: Vec<String> = queue
        .scan_pending(100)
        .await
        .unwrap()
        .iter()
        .map(|e| e.job_id().to_string())
        .collect();
    assert_eq!(scanned, inserted);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_claim_is_exclusive_and_owner_guarded() {
    let (client, keys) = client_and_keys();
    let claims = RedisClaimStore::new(client, keys, Duration::from_secs(30));
    let job_id = JobId::from("job-1");

    assert!(claims.try_claim(&job_id, "w1").await.unwrap());
    assert!(!claims.try_claim(&job_id, "w2").await.unwrap());
    assert!(claims.renew(&job_id, "w1").await.unwrap());
    assert!(!claims.renew(&job_id, "w2").await.unwrap());

    claims.release(&job_id, "w2").await.unwrap();
    assert_eq!(claims.owner(&job_id).await.unwrap().as_deref(), Some("w1"));

    claims.release(&job_id, "w1").await.unwrap();
    claims.release(&job_id, "w1").await.unwrap();
    assert!(claims.owner(&job_id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_claim_lease_expires() {
    let (client, keys) = client_and_keys();
    let claims = RedisClaimStore::new(client, keys, Duration::from_millis(200));
    let job_id = JobId::from("job-1");

    assert!(claims.try_claim(&job_id, "crashed").await.unwrap());
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(claims.try_claim(&job_id, "survivor").await.unwrap());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_status_history_and_subscribe() {
    let (client, keys) = client_and_keys();
    let channel = RedisStatusChannel::new(client, keys, Duration::from_secs(60));
    let job_id = JobId::from("job-1");

    let mut live = channel.subscribe(&job_id).await.unwrap();

    channel.publish(&job_id, EncodingStatus::Reading).await.unwrap();
    channel
        .publish(&job_id, EncodingStatus::Encoding { percent: 42 })
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), live.next())
        .await
        .expect("timed out waiting for event")
        .expect("stream ended");
    assert_eq!(first.status, EncodingStatus::Reading);

    let history = channel.history(&job_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(
        channel.latest(&job_id).await.unwrap(),
        EncodingStatus::Encoding { percent: 42 }
    );
}
