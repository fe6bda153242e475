//! Paged teardown jobs: `unprocess_song_batch` and `clear_all`.
//!
//! Both select a page of song IDs, remove the page's verses (and, for
//! `clear_all`, the songs) in one transaction, and queue a successor only
//! while pages come back full.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn, Span};
use uuid::Uuid;

use versebank_core::{
    defaults, logging, JobScheduler, JobType, PipelineStore, Result, TeardownSummary,
    UnprocessSongBatchArgs,
};

use crate::handler::{JobContext, JobHandler, JobResult};

/// What one teardown invocation did. Stored as the job result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownOutcome {
    pub songs_selected: usize,
    /// Songs reset (unprocess) or deleted (clear).
    pub songs_affected: usize,
    pub verses_deleted: usize,
    pub next_job_id: Option<Uuid>,
}

impl TeardownOutcome {
    fn new(selected: usize, summary: TeardownSummary, next_job_id: Option<Uuid>) -> Self {
        Self {
            songs_selected: selected,
            songs_affected: summary.songs_affected,
            verses_deleted: summary.verses_deleted,
            next_job_id,
        }
    }
}

fn outcome_to_result(outcome: Result<TeardownOutcome>, done: &str) -> JobResult {
    match outcome {
        Ok(outcome) => JobResult::Success(serde_json::to_value(&outcome).ok()),
        Err(e) => {
            error!(error = %e, error_kind = e.kind(), "{} failed, chain stopped", done);
            JobResult::Failed(e.to_string())
        }
    }
}

// =============================================================================
// unprocess_song_batch
// =============================================================================

/// Handler for `unprocess_song_batch` jobs.
pub struct UnprocessSongBatchHandler {
    store: Arc<dyn PipelineStore>,
    scheduler: Arc<dyn JobScheduler>,
    reschedule_delay: Duration,
}

impl UnprocessSongBatchHandler {
    pub fn new(store: Arc<dyn PipelineStore>, scheduler: Arc<dyn JobScheduler>) -> Self {
        Self {
            store,
            scheduler,
            reschedule_delay: Duration::from_millis(defaults::RESCHEDULE_DELAY_MS),
        }
    }

    pub fn with_reschedule_delay(mut self, delay: Duration) -> Self {
        self.reschedule_delay = delay;
        self
    }

    /// Run one invocation outside the worker.
    pub async fn run(&self, args: UnprocessSongBatchArgs) -> Result<TeardownOutcome> {
        args.validate()?;
        let start = Instant::now();

        let ids = self.store.select_processed(args.limit).await?;
        Span::current().record(logging::SONG_COUNT, ids.len());
        if ids.is_empty() {
            info!(limit = args.limit, "No processed songs left, chain complete");
            return Ok(TeardownOutcome::default());
        }

        let summary = self.store.unprocess_songs(&ids).await?;
        Span::current().record(logging::VERSE_COUNT, summary.verses_deleted);

        let next_job_id = if args.recursive && ids.len() as i64 == args.limit {
            let id = self
                .scheduler
                .run_after(
                    self.reschedule_delay,
                    JobType::UnprocessSongBatch,
                    Some(serde_json::to_value(args)?),
                )
                .await?;
            Span::current().record(logging::NEXT_JOB_ID, tracing::field::display(id));
            Some(id)
        } else {
            None
        };

        info!(
            song_count = summary.songs_affected,
            verse_count = summary.verses_deleted,
            duration_ms = start.elapsed().as_millis() as u64,
            "Song batch unprocessed"
        );
        Ok(TeardownOutcome::new(ids.len(), summary, next_job_id))
    }
}

#[async_trait]
impl JobHandler for UnprocessSongBatchHandler {
    fn job_type(&self) -> JobType {
        JobType::UnprocessSongBatch
    }

    #[instrument(
        skip(self, ctx),
        fields(
            subsystem = "jobs",
            component = "unprocess_song_batch",
            op = "execute",
            job_id = %ctx.job.id,
            song_count = tracing::field::Empty,
            verse_count = tracing::field::Empty,
            next_job_id = tracing::field::Empty,
        )
    )]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        let args: UnprocessSongBatchArgs = match ctx.parse_args() {
            Ok(args) => args,
            Err(e) => {
                warn!(error = %e, "Rejecting job payload");
                return JobResult::Failed(e.to_string());
            }
        };
        outcome_to_result(self.run(args).await, "Unprocess")
    }
}

// =============================================================================
// clear_all
// =============================================================================

/// Handler for `clear_all` jobs. Always recursive; the page size is fixed.
///
/// Deletes every song, unprocessed ones included, along with their verses.
pub struct ClearAllHandler {
    store: Arc<dyn PipelineStore>,
    scheduler: Arc<dyn JobScheduler>,
    page_size: i64,
    reschedule_delay: Duration,
}

impl ClearAllHandler {
    pub fn new(store: Arc<dyn PipelineStore>, scheduler: Arc<dyn JobScheduler>) -> Self {
        Self {
            store,
            scheduler,
            page_size: defaults::CLEAR_PAGE_SIZE,
            reschedule_delay: Duration::from_millis(defaults::RESCHEDULE_DELAY_MS),
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_reschedule_delay(mut self, delay: Duration) -> Self {
        self.reschedule_delay = delay;
        self
    }

    /// Run one invocation outside the worker.
    pub async fn run(&self) -> Result<TeardownOutcome> {
        let start = Instant::now();

        // Processed or not: a clear removes everything.
        let ids = self.store.select_any(self.page_size).await?;
        Span::current().record(logging::SONG_COUNT, ids.len());
        if ids.is_empty() {
            info!("No songs left, clear complete");
            return Ok(TeardownOutcome::default());
        }

        let summary = self.store.clear_songs(&ids).await?;
        Span::current().record(logging::VERSE_COUNT, summary.verses_deleted);

        let next_job_id = if ids.len() as i64 == self.page_size {
            let id = self
                .scheduler
                .run_after(self.reschedule_delay, JobType::ClearAll, None)
                .await?;
            Span::current().record(logging::NEXT_JOB_ID, tracing::field::display(id));
            Some(id)
        } else {
            None
        };

        info!(
            song_count = summary.songs_affected,
            verse_count = summary.verses_deleted,
            duration_ms = start.elapsed().as_millis() as u64,
            "Song page cleared"
        );
        Ok(TeardownOutcome::new(ids.len(), summary, next_job_id))
    }
}

#[async_trait]
impl JobHandler for ClearAllHandler {
    fn job_type(&self) -> JobType {
        JobType::ClearAll
    }

    #[instrument(
        skip(self, ctx),
        fields(
            subsystem = "jobs",
            component = "clear_all",
            op = "execute",
            job_id = %ctx.job.id,
            song_count = tracing::field::Empty,
            verse_count = tracing::field::Empty,
            next_job_id = tracing::field::Empty,
        )
    )]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        outcome_to_result(self.run().await, "Clear")
    }
}
