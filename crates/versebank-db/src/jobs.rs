//! Job repository implementation.
//!
//! `job_queue` is the durable scheduler behind self-rescheduling jobs: a
//! successor is an ordinary row whose `run_at` may lie in the future, and
//! workers only claim rows that are due.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use versebank_core::{
    defaults, new_v7, Error, Job, JobRepository, JobStatus, JobType, QueueStats, Result,
};

const JOB_COLUMNS: &str = "id, job_type::text, status::text, priority, payload, result, \
                           error_message, progress_percent, progress_message, retry_count, \
                           max_retries, run_at, created_at, started_at, completed_at";

/// PostgreSQL implementation of JobRepository.
#[derive(Clone)]
pub struct PgJobRepository {
    pool: Pool<Postgres>,
    /// Wakes idle workers as soon as a job is queued.
    notify: Arc<Notify>,
}

impl PgJobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a PgJobRepository sharing an existing notify handle.
    pub fn with_notify(pool: Pool<Postgres>, notify: Arc<Notify>) -> Self {
        Self { pool, notify }
    }

    /// Handle notified on every successful enqueue.
    pub fn job_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    fn parse_job_row(row: PgRow) -> Result<Job> {
        let job_type: String = row.get("job_type");
        let status: String = row.get("status");

        Ok(Job {
            id: row.get("id"),
            job_type: JobType::parse(&job_type)
                .ok_or_else(|| Error::Job(format!("Unknown job type: {}", job_type)))?,
            status: JobStatus::parse(&status)
                .ok_or_else(|| Error::Job(format!("Unknown job status: {}", status)))?,
            priority: row.get("priority"),
            payload: row.get("payload"),
            result: row.get("result"),
            error_message: row.get("error_message"),
            progress_percent: row.get("progress_percent"),
            progress_message: row.get("progress_message"),
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            run_at: row.get("run_at"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        })
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn queue(
        &self,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        self.queue_after(Duration::ZERO, job_type, priority, payload)
            .await
    }

    async fn queue_after(
        &self,
        delay: Duration,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        let job_id = new_v7();
        let now = Utc::now();
        let delay = chrono::Duration::from_std(delay)
            .map_err(|e| Error::InvalidInput(format!("Invalid job delay: {}", e)))?;

        sqlx::query(
            "INSERT INTO job_queue (id, job_type, status, priority, payload, max_retries, run_at, created_at)
             VALUES ($1, $2::job_type, 'pending'::job_status, $3, $4, $5, $6, $7)",
        )
        .bind(job_id)
        .bind(job_type.as_str())
        .bind(priority)
        .bind(&payload)
        .bind(defaults::JOB_MAX_RETRIES)
        .bind(now + delay)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "jobs",
            op = "queue",
            job_id = %job_id,
            job_type = %job_type,
            delay_ms = delay.num_milliseconds(),
            "Job queued"
        );

        // Stores a permit when no worker is waiting yet.
        self.notify.notify_one();
        Ok(job_id)
    }

    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let now = Utc::now();
        let type_strings: Vec<&str> = job_types.iter().map(|jt| jt.as_str()).collect();

        // FOR UPDATE SKIP LOCKED lets several workers claim without blocking.
        // Empty array = claim any type.
        let row = sqlx::query(&format!(
            "UPDATE job_queue
             SET status = 'running'::job_status, started_at = $1
             WHERE id = (
                 SELECT id FROM job_queue
                 WHERE status = 'pending'::job_status
                   AND run_at <= $1
                   AND (cardinality($2::text[]) = 0 OR job_type::text = ANY($2))
                 ORDER BY priority DESC, run_at ASC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(now)
        .bind(&type_strings)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        percent: i32,
        message: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE job_queue SET progress_percent = $1, progress_message = $2
             WHERE id = $3 AND status = 'running'::job_status",
        )
        .bind(percent.clamp(0, 100))
        .bind(message)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE job_queue
             SET status = 'completed'::job_status, completed_at = $1, result = $2,
                 progress_percent = 100
             WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(&result)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Job {}", job_id)));
        }
        Ok(())
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (retry_count, max_retries): (i32, i32) =
            sqlx::query_as("SELECT retry_count, max_retries FROM job_queue WHERE id = $1 FOR UPDATE")
                .bind(job_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?
                .ok_or_else(|| Error::NotFound(format!("Job {}", job_id)))?;

        if retry_count < max_retries {
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'pending'::job_status, retry_count = $1, error_message = $2,
                     started_at = NULL, progress_percent = 0, progress_message = NULL,
                     run_at = $3
                 WHERE id = $4",
            )
            .bind(retry_count + 1)
            .bind(error)
            .bind(now)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                "UPDATE job_queue
                 SET status = 'failed'::job_status, completed_at = $1, error_message = $2
                 WHERE id = $3",
            )
            .bind(now)
            .bind(error)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM job_queue WHERE id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job_queue WHERE status = 'pending'::job_status",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(count)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM job_queue
             ORDER BY created_at DESC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_job_row).collect()
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'running') as running,
                COUNT(*) FILTER (WHERE status = 'completed' AND completed_at > NOW() - INTERVAL '1 hour') as completed_last_hour,
                COUNT(*) FILTER (WHERE status = 'failed' AND completed_at > NOW() - INTERVAL '1 hour') as failed_last_hour,
                COUNT(*) as total
             FROM job_queue",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get::<i64, _>("pending"),
            running: row.get::<i64, _>("running"),
            completed_last_hour: row.get::<i64, _>("completed_last_hour"),
            failed_last_hour: row.get::<i64, _>("failed_last_hour"),
            total: row.get::<i64, _>("total"),
        })
    }

    async fn cleanup(&self, older_than_days: i64) -> Result<i64> {
        let result = sqlx::query(
            "DELETE FROM job_queue
             WHERE status IN ('completed', 'failed')
               AND completed_at < NOW() - make_interval(days => $1::int)",
        )
        .bind(older_than_days)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() as i64)
    }
}
