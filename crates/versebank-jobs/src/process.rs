//! `process_song_batch`: segment, embed, and commit one page of songs.
//!
//! An invocation walks `SELECT -> TRANSFORM -> COMMIT -> RESCHEDULE`:
//!
//! 1. Select up to `limit` unprocessed songs with at least `min_views` views.
//!    An empty page ends the chain.
//! 2. Segment every song and embed all verses of the page in a single call.
//! 3. Commit verses and processed flags in one transaction.
//! 4. When `recursive`, queue a successor with the same arguments.
//!
//! Any error before the commit leaves the store untouched and queues nothing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn, Span};
use uuid::Uuid;

use versebank_core::{
    defaults, logging, EmbeddingBackend, Error, JobScheduler, JobType, PipelineStore,
    ProcessSongBatchArgs, Result, SongVerses, UnprocessedSong, Vector,
};
use versebank_db::VerseSegmenter;

use crate::handler::{JobContext, JobHandler, JobResult};

/// What one `process_song_batch` invocation did. Stored as the job result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// Songs returned by the selector.
    pub songs_selected: usize,
    /// Songs this invocation flipped to processed.
    pub songs_committed: usize,
    /// Songs another invocation got to first.
    pub songs_skipped: usize,
    /// Verse rows written.
    pub verses_written: usize,
    /// Successor job, if one was queued.
    pub next_job_id: Option<Uuid>,
}

/// Handler for `process_song_batch` jobs.
pub struct ProcessSongBatchHandler {
    store: Arc<dyn PipelineStore>,
    embedder: Arc<dyn EmbeddingBackend>,
    scheduler: Arc<dyn JobScheduler>,
    segmenter: VerseSegmenter,
    reschedule_delay: Duration,
}

impl ProcessSongBatchHandler {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        embedder: Arc<dyn EmbeddingBackend>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Self {
        Self {
            store,
            embedder,
            scheduler,
            segmenter: VerseSegmenter::default(),
            reschedule_delay: Duration::from_millis(defaults::RESCHEDULE_DELAY_MS),
        }
    }

    pub fn with_segmenter(mut self, segmenter: VerseSegmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    /// Delay before a queued successor becomes claimable.
    pub fn with_reschedule_delay(mut self, delay: Duration) -> Self {
        self.reschedule_delay = delay;
        self
    }

    /// Run one invocation outside the worker.
    pub async fn run(&self, args: ProcessSongBatchArgs) -> Result<ProcessOutcome> {
        self.run_with_progress(args, |_, _| {}).await
    }

    async fn run_with_progress<P>(
        &self,
        args: ProcessSongBatchArgs,
        progress: P,
    ) -> Result<ProcessOutcome>
    where
        P: Fn(i32, &str) + Send + Sync,
    {
        args.validate()?;
        let start = Instant::now();

        progress(10, "Selecting songs");
        let batch = self
            .store
            .select_unprocessed(args.limit, args.min_views)
            .await?;
        Span::current().record(logging::SONG_COUNT, batch.len());

        if batch.is_empty() {
            info!(
                limit = args.limit,
                min_views = args.min_views,
                "No unprocessed songs left, chain complete"
            );
            return Ok(ProcessOutcome::default());
        }

        progress(30, "Embedding verses");
        let songs = self.transform(&batch).await?;

        progress(80, "Committing verses");
        let summary = self
            .store
            .commit_verses(&songs, self.embedder.model_name())
            .await?;
        Span::current().record(logging::VERSE_COUNT, summary.verses_written);

        let next_job_id = if args.recursive {
            let payload = serde_json::to_value(args)?;
            let id = self
                .scheduler
                .run_after(
                    self.reschedule_delay,
                    JobType::ProcessSongBatch,
                    Some(payload),
                )
                .await?;
            Span::current().record(logging::NEXT_JOB_ID, tracing::field::display(id));
            Some(id)
        } else {
            None
        };

        info!(
            songs_selected = batch.len(),
            songs_committed = summary.songs_committed,
            songs_skipped = summary.songs_skipped,
            verse_count = summary.verses_written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Song batch processed"
        );

        Ok(ProcessOutcome {
            songs_selected: batch.len(),
            songs_committed: summary.songs_committed,
            songs_skipped: summary.songs_skipped,
            verses_written: summary.verses_written,
            next_job_id,
        })
    }

    /// Segment the page, embed every verse in one call, and regroup the
    /// vectors by song in input order.
    async fn transform(&self, batch: &[UnprocessedSong]) -> Result<Vec<SongVerses>> {
        let segmented: Vec<(Uuid, Vec<String>)> = batch
            .iter()
            .map(|song| (song.id, self.segmenter.segment(&song.lyrics)))
            .collect();

        let texts: Vec<String> = segmented
            .iter()
            .flat_map(|(_, verses)| verses.iter().cloned())
            .collect();

        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_texts(&texts).await?
        };
        check_vectors(texts.len(), &vectors, self.embedder.dimension())?;

        let mut vectors = vectors.into_iter();
        Ok(segmented
            .into_iter()
            .map(|(song_id, verses)| SongVerses {
                song_id,
                verses: verses.into_iter().zip(vectors.by_ref()).collect(),
            })
            .collect())
    }
}

/// One vector per text, each of the backend's advertised dimension.
fn check_vectors(expected: usize, vectors: &[Vector], dimension: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::Embedding(format!(
            "Expected {} embeddings, backend returned {}",
            expected,
            vectors.len()
        )));
    }
    if let Some((i, v)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.as_slice().len() != dimension)
    {
        return Err(Error::Embedding(format!(
            "Embedding {} has dimension {}, expected {}",
            i,
            v.as_slice().len(),
            dimension
        )));
    }
    Ok(())
}

#[async_trait]
impl JobHandler for ProcessSongBatchHandler {
    fn job_type(&self) -> JobType {
        JobType::ProcessSongBatch
    }

    #[instrument(
        skip(self, ctx),
        fields(
            subsystem = "jobs",
            component = "process_song_batch",
            op = "execute",
            job_id = %ctx.job.id,
            song_count = tracing::field::Empty,
            verse_count = tracing::field::Empty,
            next_job_id = tracing::field::Empty,
        )
    )]
    async fn execute(&self, ctx: JobContext) -> JobResult {
        let args: ProcessSongBatchArgs = match ctx.parse_args() {
            Ok(args) => args,
            Err(e) => {
                warn!(error = %e, "Rejecting job payload");
                return JobResult::Failed(e.to_string());
            }
        };

        let result = self
            .run_with_progress(args, |percent, message| {
                ctx.report_progress(percent, Some(message))
            })
            .await;

        match result {
            Ok(outcome) => {
                ctx.report_progress(100, Some("Batch complete"));
                JobResult::Success(serde_json::to_value(&outcome).ok())
            }
            Err(e) => {
                error!(error = %e, error_kind = e.kind(), "Song batch failed, chain stopped");
                JobResult::Failed(e.to_string())
            }
        }
    }
}
