//! PostgreSQL backend tests. They need a live database (`DATABASE_URL`),
//! so they are ignored by default: `cargo test -p warden-db -- --ignored`.

use serde_json::json;
use sqlx::PgPool;
use warden_core::backend::{AttributeStore, QueueBackend};
use warden_core::job::{JobOutcome, JobStatus, JobType, NewJob};
use warden_db::repositories::AttributeRepo;
use warden_db::{PgAttributeStore, PgQueueBackend};

fn new_job(job_type: JobType) -> NewJob {
    NewJob {
        queue: job_type.queue_name().to_string(),
        job_type,
        payload: json!({ "value": "8.8.8.8" }),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn enqueue_claim_complete(pool: PgPool) {
    warden_db::health_check(&pool).await.unwrap();
    let backend = PgQueueBackend::new(pool);

    let id = backend.enqueue(new_job(JobType::Enrichment)).await.unwrap();
    assert_eq!(backend.fetch_status(&id).await.unwrap(), Some(JobStatus::Queued));

    let claimed = backend.dequeue("enrichment").await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert!(backend.dequeue("enrichment").await.unwrap().is_none());

    assert!(backend
        .complete(&id, JobOutcome::Success(Some(json!({ "ok": true }))))
        .await
        .unwrap());
    let job = backend.fetch(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.result, Some(json!({ "ok": true })));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn revoke_reports_prior_status_and_blocks_completion(pool: PgPool) {
    let backend = PgQueueBackend::new(pool);
    let id = backend.enqueue(new_job(JobType::Enrichment)).await.unwrap();
    backend.dequeue("enrichment").await.unwrap();

    assert_eq!(backend.revoke(&id).await.unwrap(), Some(JobStatus::InProgress));
    assert_eq!(backend.revoke(&id).await.unwrap(), Some(JobStatus::Revoked));
    assert!(!backend
        .complete(&id, JobOutcome::Failed("late".into()))
        .await
        .unwrap());
    assert_eq!(backend.fetch_status(&id).await.unwrap(), Some(JobStatus::Revoked));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn fire_and_forget_result_is_not_stored(pool: PgPool) {
    let backend = PgQueueBackend::new(pool);
    let id = backend.enqueue(new_job(JobType::WebhookNotify)).await.unwrap();
    backend.dequeue("notification").await.unwrap();
    backend
        .complete(&id, JobOutcome::Success(Some(json!("ignored"))))
        .await
        .unwrap();

    let job = backend.fetch(&id).await.unwrap().unwrap();
    assert!(!job.has_result);
    assert_eq!(job.result, None);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn unknown_and_malformed_ids(pool: PgPool) {
    let backend = PgQueueBackend::new(pool);
    assert!(backend.fetch("not-a-uuid").await.unwrap().is_none());
    assert!(backend
        .revoke(&uuid::Uuid::new_v4().to_string())
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn counters_and_attributes(pool: PgPool) {
    let backend = PgQueueBackend::new(pool.clone());
    backend.enqueue(new_job(JobType::CorrelateValue)).await.unwrap();
    backend.enqueue(new_job(JobType::CorrelationPlugin)).await.unwrap();
    backend.dequeue("correlation").await.unwrap();

    let counters = backend.counters("correlation").await.unwrap();
    assert_eq!(counters.queued, 1);
    assert_eq!(counters.running, 1);

    AttributeRepo::insert(&pool, "e1", "evil.example").await.unwrap();
    AttributeRepo::insert(&pool, "e2", "evil.example").await.unwrap();
    let store = PgAttributeStore::new(pool);
    assert_eq!(store.count_by_value("evil.example").await.unwrap(), 2);
    assert_eq!(store.find_by_value("evil.example", 1).await.unwrap().len(), 1);
}
