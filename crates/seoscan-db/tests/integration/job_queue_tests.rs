use std::time::Duration;

use seoscan_core::job::PageJob;
use seoscan_core::job_queue::JobQueue;
use seoscan_db::CrawlJobRepository;
use uuid::Uuid;

use crate::integration::common::setup_test_db;

fn page_job(url: &str) -> PageJob {
    PageJob::new(Uuid::new_v4(), Uuid::new_v4(), url)
}

#[tokio::test]
async fn enqueue_and_claim_round_trips_payload() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlJobRepository::new(pool.clone());

    let job = page_job("http://site.test/");
    let id = repo.enqueue(job.clone(), 3).await.unwrap();

    let claimed = repo
        .claim("worker-1")
        .await
        .unwrap()
        .expect("Should claim the job");

    assert_eq!(claimed.id, id);
    assert_eq!(claimed.job, job);
    assert_eq!(claimed.attempt, 1);
    assert_eq!(claimed.max_attempts, 3);
    assert_eq!(claimed.worker_id.as_deref(), Some("worker-1"));

    let (payload,): (serde_json::Value,) =
        sqlx::query_as("SELECT payload FROM crawl_jobs WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(payload["url"], "http://site.test/");
    assert!(payload.get("scanId").is_some());
    assert!(payload.get("pageId").is_some());
}

#[tokio::test]
async fn claim_returns_none_when_empty() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlJobRepository::new(pool);

    assert!(repo.claim("worker-1").await.unwrap().is_none());
}

#[tokio::test]
async fn claim_skips_running_jobs() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlJobRepository::new(pool);

    repo.enqueue(page_job("http://site.test/"), 2).await.unwrap();

    assert!(repo.claim("worker-1").await.unwrap().is_some());
    assert!(repo.claim("worker-2").await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_claims_never_share_a_job() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlJobRepository::new(pool);

    for i in 0..10 {
        repo.enqueue(page_job(&format!("http://site.test/{i}")), 2)
            .await
            .unwrap();
    }

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.claim(&format!("worker-{i}")).await.unwrap() })
        })
        .collect();

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(job) = handle.await.unwrap() {
            claimed.push(job.id);
        }
    }
    claimed.sort();
    claimed.dedup();
    assert_eq!(claimed.len(), 10);
}

#[tokio::test]
async fn complete_deletes_the_job() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlJobRepository::new(pool);

    repo.enqueue(page_job("http://site.test/"), 2).await.unwrap();
    let claimed = repo.claim("worker-1").await.unwrap().unwrap();

    repo.complete(claimed.id).await.unwrap();

    assert_eq!(repo.outstanding().await.unwrap(), 0);
}

#[tokio::test]
async fn retry_delays_redelivery_and_keeps_job_id() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlJobRepository::new(pool);

    repo.enqueue(page_job("http://site.test/"), 3).await.unwrap();
    let first = repo.claim("worker-1").await.unwrap().unwrap();

    let later = chrono::Utc::now() + chrono::TimeDelta::minutes(5);
    repo.retry(first.id, "HTTP 503", later).await.unwrap();
    assert!(
        repo.claim("worker-1").await.unwrap().is_none(),
        "Job must not be due before run_at"
    );

    repo.retry(first.id, "HTTP 503", chrono::Utc::now())
        .await
        .unwrap();
    let second = repo.claim("worker-2").await.unwrap().unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.attempt, 2);
}

#[tokio::test]
async fn discard_deletes_the_job() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlJobRepository::new(pool);

    repo.enqueue(page_job("http://site.test/"), 1).await.unwrap();
    let claimed = repo.claim("worker-1").await.unwrap().unwrap();

    repo.discard(claimed.id, "gave up").await.unwrap();

    assert_eq!(repo.outstanding().await.unwrap(), 0);
}

#[tokio::test]
async fn release_worker_jobs_refunds_the_attempt() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlJobRepository::new(pool);

    repo.enqueue(page_job("http://site.test/a"), 2).await.unwrap();
    repo.enqueue(page_job("http://site.test/b"), 2).await.unwrap();
    repo.claim("worker-1").await.unwrap();
    repo.claim("worker-1").await.unwrap();

    let released = repo.release_worker_jobs("worker-1").await.unwrap();
    assert_eq!(released, 2);

    let again = repo.claim("worker-2").await.unwrap().unwrap();
    assert_eq!(again.attempt, 1);
}

#[tokio::test]
async fn requeue_stale_recovers_abandoned_jobs() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlJobRepository::new(pool.clone());

    let retryable = repo.enqueue(page_job("http://site.test/a"), 2).await.unwrap();
    let spent = repo.enqueue(page_job("http://site.test/b"), 1).await.unwrap();
    repo.claim("dead-worker").await.unwrap();
    repo.claim("dead-worker").await.unwrap();
    let fresh = repo.enqueue(page_job("http://site.test/c"), 2).await.unwrap();
    repo.claim("live-worker").await.unwrap();

    // Only the dead worker's locks are old.
    sqlx::query(
        "UPDATE crawl_jobs SET locked_at = NOW() - INTERVAL '1 hour' WHERE worker_id = 'dead-worker'",
    )
    .execute(&pool)
    .await
    .unwrap();

    let stale = repo.requeue_stale(Duration::from_secs(60)).await.unwrap();

    assert_eq!(stale.requeued, 1);
    assert_eq!(stale.exhausted.len(), 1);
    assert_eq!(stale.exhausted[0].id, spent);
    assert_eq!(repo.outstanding().await.unwrap(), 2);

    let redelivered = repo.claim("worker-2").await.unwrap().unwrap();
    assert_eq!(redelivered.id, retryable);
    assert_eq!(redelivered.attempt, 2);
    assert_ne!(redelivered.id, fresh);
}

#[tokio::test]
async fn outstanding_counts_pending_and_running() {
    let (pool, _container) = setup_test_db().await;
    let repo = CrawlJobRepository::new(pool);

    repo.enqueue(page_job("http://site.test/a"), 2).await.unwrap();
    repo.enqueue(page_job("http://site.test/b"), 2).await.unwrap();
    repo.claim("worker-1").await.unwrap();

    assert_eq!(repo.outstanding().await.unwrap(), 2);
}
