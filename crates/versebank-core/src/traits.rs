//! Core traits for versebank abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// SONG & VERSE REPOSITORY TRAITS
// =============================================================================

/// Repository for song records.
#[async_trait]
pub trait SongRepository: Send + Sync {
    /// Insert every song whose `genius_id` is not already stored.
    ///
    /// Duplicates (against the store or earlier in the same batch) are
    /// skipped and counted, never reported as errors.
    async fn add_batch(&self, songs: &[NewSong]) -> Result<AddBatchOutcome>;

    /// Fetch a song by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Song>>;

    /// Fetch a song by its external identifier.
    async fn get_by_genius_id(&self, genius_id: i64) -> Result<Option<Song>>;

    /// Corpus-wide counters.
    async fn stats(&self) -> Result<CorpusStats>;
}

/// Read access to committed verses.
#[async_trait]
pub trait VerseRepository: Send + Sync {
    /// All verses of a song in position order.
    async fn list_for_song(&self, song_id: Uuid) -> Result<Vec<Verse>>;

    /// Number of verses stored for a song.
    async fn count_for_song(&self, song_id: Uuid) -> Result<i64>;
}

// =============================================================================
// PIPELINE STORE
// =============================================================================

/// Batch selection and transactional mutations used by the pipeline jobs.
///
/// Every mutating method runs in a single transaction: either all of its
/// writes apply or none do.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Up to `limit` unprocessed songs with at least `min_views` views,
    /// ordered by `(genius_views, id)`. A non-positive limit yields an empty page.
    async fn select_unprocessed(&self, limit: i64, min_views: i64)
        -> Result<Vec<UnprocessedSong>>;

    /// Up to `limit` processed song IDs, ordered by ID.
    async fn select_processed(&self, limit: i64) -> Result<Vec<Uuid>>;

    /// Up to `limit` song IDs regardless of their processed flag, ordered by ID.
    async fn select_any(&self, limit: i64) -> Result<Vec<Uuid>>;

    /// Insert verses and mark each song processed.
    ///
    /// A song is only written if this call is the one that flips its flag
    /// from `false` to `true`; songs already processed or deleted are skipped.
    async fn commit_verses(&self, batch: &[SongVerses], model: &str) -> Result<CommitSummary>;

    /// Delete all verses of the given songs and reset them to unprocessed.
    async fn unprocess_songs(&self, song_ids: &[Uuid]) -> Result<TeardownSummary>;

    /// Delete all verses of the given songs, then the songs themselves.
    async fn clear_songs(&self, song_ids: &[Uuid]) -> Result<TeardownSummary>;
}

// =============================================================================
// JOB QUEUE TRAITS
// =============================================================================

/// Repository for job queue operations.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Queue a job that is claimable immediately.
    async fn queue(
        &self,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid>;

    /// Queue a job that becomes claimable after `delay`.
    async fn queue_after(
        &self,
        delay: Duration,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid>;

    /// Claim the next due pending job whose type is in `job_types`.
    /// An empty slice means "claim any type".
    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>>;

    /// Update job progress.
    async fn update_progress(
        &self,
        job_id: Uuid,
        percent: i32,
        message: Option<&str>,
    ) -> Result<()>;

    /// Mark job as completed.
    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Mark job as failed (or back to pending while retries remain).
    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()>;

    /// Get job by ID.
    async fn get(&self, job_id: Uuid) -> Result<Option<Job>>;

    /// Get pending jobs count.
    async fn pending_count(&self) -> Result<i64>;

    /// List recent jobs, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>>;

    /// Get queue statistics.
    async fn queue_stats(&self) -> Result<QueueStats>;

    /// Delete finished jobs older than `older_than_days`. Returns rows removed.
    async fn cleanup(&self, older_than_days: i64) -> Result<i64>;
}

/// Deferred invocation of a job, as seen by a job that reschedules itself.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Enqueue `job_type` with `payload`, claimable after `delay`.
    async fn run_after(
        &self,
        delay: Duration,
        job_type: JobType,
        payload: Option<JsonValue>,
    ) -> Result<Uuid>;
}

#[async_trait]
impl<R: JobRepository + ?Sized> JobScheduler for R {
    async fn run_after(
        &self,
        delay: Duration,
        job_type: JobType,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        self.queue_after(delay, job_type, job_type.default_priority(), payload)
            .await
    }
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns one vector per input text, in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
