//! Batch selection and transactional commit/teardown for the pipeline jobs.
//!
//! The selectors page through `song` in a stable index order. The mutations
//! each run in one transaction so a song is never left processed with only
//! part of its verses, or unprocessed with verses still attached.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info, trace};
use uuid::Uuid;

use versebank_core::{
    CommitSummary, Error, PipelineStore, Result, SongVerses, TeardownSummary, UnprocessedSong,
};

use crate::songs::PgSongRepository;
use crate::verses::PgVerseRepository;

/// PostgreSQL implementation of PipelineStore.
#[derive(Clone)]
pub struct PgPipelineStore {
    pool: Pool<Postgres>,
    songs: PgSongRepository,
    verses: PgVerseRepository,
}

impl PgPipelineStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            songs: PgSongRepository::new(pool.clone()),
            verses: PgVerseRepository::new(pool.clone()),
            pool,
        }
    }

    async fn select_ids(&self, sql: &str, limit: i64) -> Result<Vec<Uuid>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = sqlx::query_scalar(sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(ids)
    }
}

#[async_trait]
impl PipelineStore for PgPipelineStore {
    async fn select_unprocessed(
        &self,
        limit: i64,
        min_views: i64,
    ) -> Result<Vec<UnprocessedSong>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, lyrics FROM song
             WHERE processed = FALSE AND genius_views >= $1
             ORDER BY genius_views, id
             LIMIT $2",
        )
        .bind(min_views)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let batch: Vec<UnprocessedSong> = rows
            .into_iter()
            .map(|row| UnprocessedSong {
                id: row.get("id"),
                lyrics: row.get("lyrics"),
            })
            .collect();

        debug!(
            subsystem = "db",
            component = "pipeline",
            op = "select_unprocessed",
            limit,
            min_views,
            song_count = batch.len(),
            "Selected unprocessed page"
        );
        Ok(batch)
    }

    async fn select_processed(&self, limit: i64) -> Result<Vec<Uuid>> {
        self.select_ids(
            "SELECT id FROM song WHERE processed ORDER BY id LIMIT $1",
            limit,
        )
        .await
    }

    async fn select_any(&self, limit: i64) -> Result<Vec<Uuid>> {
        self.select_ids("SELECT id FROM song ORDER BY id LIMIT $1", limit)
            .await
    }

    async fn commit_verses(&self, batch: &[SongVerses], model: &str) -> Result<CommitSummary> {
        let start = Instant::now();
        let mut summary = CommitSummary::default();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        for song in batch {
            // Verses are written only by the transaction that flips the flag.
            if !self.songs.mark_processed_tx(&mut tx, song.song_id).await? {
                trace!(
                    subsystem = "db",
                    component = "pipeline",
                    song_id = %song.song_id,
                    "Song already processed or removed, skipping"
                );
                summary.songs_skipped += 1;
                continue;
            }
            summary.verses_written += self
                .verses
                .store_tx(&mut tx, song.song_id, &song.verses, model)
                .await?;
            summary.songs_committed += 1;
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pipeline",
            op = "commit_verses",
            song_count = summary.songs_committed,
            skipped = summary.songs_skipped,
            verse_count = summary.verses_written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Committed verses"
        );
        Ok(summary)
    }

    async fn unprocess_songs(&self, song_ids: &[Uuid]) -> Result<TeardownSummary> {
        if song_ids.is_empty() {
            return Ok(TeardownSummary::default());
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.songs.lock_many_tx(&mut tx, song_ids).await?;
        let verses_deleted = self.verses.delete_for_songs_tx(&mut tx, song_ids).await?;
        let songs_reset = self.songs.reset_processed_tx(&mut tx, song_ids).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pipeline",
            op = "unprocess_songs",
            song_count = songs_reset,
            verse_count = verses_deleted,
            "Reset songs to unprocessed"
        );
        Ok(TeardownSummary {
            songs_affected: songs_reset as usize,
            verses_deleted: verses_deleted as usize,
        })
    }

    async fn clear_songs(&self, song_ids: &[Uuid]) -> Result<TeardownSummary> {
        if song_ids.is_empty() {
            return Ok(TeardownSummary::default());
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        self.songs.lock_many_tx(&mut tx, song_ids).await?;
        let verses_deleted = self.verses.delete_for_songs_tx(&mut tx, song_ids).await?;
        let songs_deleted = self.songs.delete_many_tx(&mut tx, song_ids).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pipeline",
            op = "clear_songs",
            song_count = songs_deleted,
            verse_count = verses_deleted,
            "Deleted songs and their verses"
        );
        Ok(TeardownSummary {
            songs_affected: songs_deleted as usize,
            verses_deleted: verses_deleted as usize,
        })
    }
}
