//! Integration tests for the PostgreSQL job queue.

use std::time::Duration;

use serde_json::json;
use versebank_db::test_fixtures::TestDatabase;
use versebank_db::{JobRepository, JobScheduler, JobStatus, JobType};

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a pgvector-enabled database
async fn test_queue_claim_complete() {
    let test_db = TestDatabase::new().await;
    let jobs = &test_db.db.jobs;

    let payload = json!({"limit": 5, "min_views": 0, "recursive": true});
    let id = jobs
        .queue(JobType::ProcessSongBatch, 5, Some(payload.clone()))
        .await
        .unwrap();
    assert_eq!(jobs.pending_count().await.unwrap(), 1);

    let claimed = jobs.claim_next_for_types(&[]).await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.status, JobStatus::Running);
    assert_eq!(claimed.payload, Some(payload));
    assert!(jobs.claim_next_for_types(&[]).await.unwrap().is_none());

    jobs.complete(id, Some(json!({"songs_selected": 0})))
        .await
        .unwrap();
    let done = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress_percent, 100);
    assert!(done.completed_at.is_some());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a pgvector-enabled database
async fn test_delayed_job_not_claimable_until_due() {
    let test_db = TestDatabase::new().await;
    let jobs = &test_db.db.jobs;

    jobs.run_after(Duration::from_secs(3600), JobType::ClearAll, None)
        .await
        .unwrap();
    assert!(jobs.claim_next_for_types(&[]).await.unwrap().is_none());

    let due = jobs
        .run_after(Duration::ZERO, JobType::ClearAll, None)
        .await
        .unwrap();
    let claimed = jobs.claim_next_for_types(&[]).await.unwrap().unwrap();
    assert_eq!(claimed.id, due);
    assert_eq!(claimed.priority, JobType::ClearAll.default_priority());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a pgvector-enabled database
async fn test_claim_filters_by_type_and_priority() {
    let test_db = TestDatabase::new().await;
    let jobs = &test_db.db.jobs;

    let process = jobs
        .queue(JobType::ProcessSongBatch, 5, None)
        .await
        .unwrap();
    let clear = jobs.queue(JobType::ClearAll, 9, None).await.unwrap();

    let only_process = jobs
        .claim_next_for_types(&[JobType::ProcessSongBatch])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(only_process.id, process);

    let next = jobs.claim_next_for_types(&[]).await.unwrap().unwrap();
    assert_eq!(next.id, clear);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a pgvector-enabled database
async fn test_fail_without_retries_marks_failed() {
    let test_db = TestDatabase::new().await;
    let jobs = &test_db.db.jobs;

    let id = jobs
        .queue(JobType::UnprocessSongBatch, 7, None)
        .await
        .unwrap();
    jobs.claim_next_for_types(&[]).await.unwrap().unwrap();
    jobs.fail(id, "embedding service down").await.unwrap();

    let failed = jobs.get(id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("embedding service down"));
    assert_eq!(jobs.pending_count().await.unwrap(), 0);

    let stats = jobs.queue_stats().await.unwrap();
    assert_eq!(stats.failed_last_hour, 1);
    assert_eq!(stats.total, 1);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a pgvector-enabled database
async fn test_progress_and_listing() {
    let test_db = TestDatabase::new().await;
    let jobs = &test_db.db.jobs;

    jobs.queue(JobType::ClearAll, 9, None).await.unwrap();
    let second = jobs.queue(JobType::ClearAll, 9, None).await.unwrap();

    // Progress only sticks while the job is running.
    jobs.update_progress(second, 40, Some("ignored")).await.unwrap();
    assert_eq!(jobs.get(second).await.unwrap().unwrap().progress_percent, 0);

    let running = jobs.claim_next_for_types(&[]).await.unwrap().unwrap();
    jobs.update_progress(running.id, 40, Some("embedding"))
        .await
        .unwrap();
    let job = jobs.get(running.id).await.unwrap().unwrap();
    assert_eq!(job.progress_percent, 40);
    assert_eq!(job.progress_message.as_deref(), Some("embedding"));

    jobs.complete(running.id, None).await.unwrap();
    jobs.update_progress(running.id, 80, Some("late")).await.unwrap();
    assert_eq!(
        jobs.get(running.id).await.unwrap().unwrap().progress_percent,
        100
    );

    let recent = jobs.list_recent(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, second);

    // Nothing finished long enough ago to be removed.
    assert_eq!(jobs.cleanup(7).await.unwrap(), 0);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a pgvector-enabled database
async fn test_enqueue_wakes_a_later_waiter() {
    let test_db = TestDatabase::new().await;
    let jobs = &test_db.db.jobs;
    let notify = jobs.job_notify();

    // Nobody is waiting when the job lands; the wakeup must still be delivered.
    jobs.queue(JobType::ClearAll, 9, None).await.unwrap();
    let woken = tokio::time::timeout(Duration::from_millis(100), notify.notified()).await;
    assert!(woken.is_ok());

    test_db.cleanup().await;
}
