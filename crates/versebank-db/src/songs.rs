//! Song repository implementation.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use versebank_core::{
    new_v7, AddBatchOutcome, CorpusStats, Error, NewSong, Result, Song, SongRepository,
};

const SONG_COLUMNS: &str = "id, genius_id, genre, artist, title, year, lyrics, features, \
                            genius_views, processed, created_at";

/// PostgreSQL implementation of SongRepository.
#[derive(Clone)]
pub struct PgSongRepository {
    pool: Pool<Postgres>,
}

impl PgSongRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_song_row(row: PgRow) -> Song {
        Song {
            id: row.get("id"),
            genius_id: row.get("genius_id"),
            genre: row.get("genre"),
            artist: row.get("artist"),
            title: row.get("title"),
            year: row.get("year"),
            lyrics: row.get("lyrics"),
            features: row.get("features"),
            genius_views: row.get("genius_views"),
            processed: row.get("processed"),
            created_at: row.get("created_at"),
        }
    }

    /// Insert a song unless its `genius_id` is taken. Returns the new ID, or
    /// `None` when the song was skipped.
    pub async fn insert_if_absent_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        song: &NewSong,
    ) -> Result<Option<Uuid>> {
        let id = new_v7();
        let inserted: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO song (id, genius_id, genre, artist, title, year, lyrics, features,
                               genius_views, processed, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, $10)
             ON CONFLICT (genius_id) DO NOTHING
             RETURNING id",
        )
        .bind(id)
        .bind(song.genius_id)
        .bind(&song.genre)
        .bind(&song.artist)
        .bind(&song.title)
        .bind(song.year)
        .bind(&song.lyrics)
        .bind(&song.features)
        .bind(song.genius_views)
        .bind(Utc::now())
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(inserted)
    }

    /// Flip `processed` from false to true. Returns false when the song is
    /// already processed or no longer exists.
    pub async fn mark_processed_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE song SET processed = TRUE WHERE id = $1 AND processed = FALSE")
                .bind(id)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    /// Row-lock the listed songs until the transaction ends.
    pub async fn lock_many_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query("SELECT id FROM song WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(ids)
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Reset `processed` to false for every listed song. Returns rows changed.
    pub async fn reset_processed_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
    ) -> Result<u64> {
        let result =
            sqlx::query("UPDATE song SET processed = FALSE WHERE id = ANY($1) AND processed")
                .bind(ids)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    /// Delete the listed songs. Their verses must already be gone.
    pub async fn delete_many_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[Uuid],
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM song WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SongRepository for PgSongRepository {
    async fn add_batch(&self, songs: &[NewSong]) -> Result<AddBatchOutcome> {
        let mut outcome = AddBatchOutcome::default();
        let mut seen_in_batch = HashSet::with_capacity(songs.len());

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        for song in songs {
            if !seen_in_batch.insert(song.genius_id) {
                outcome.skipped += 1;
                continue;
            }
            match self.insert_if_absent_tx(&mut tx, song).await? {
                Some(_) => outcome.inserted += 1,
                None => {
                    debug!(
                        subsystem = "db",
                        component = "songs",
                        genius_id = song.genius_id,
                        "Skipping song with existing genius_id"
                    );
                    outcome.skipped += 1;
                }
            }
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "songs",
            op = "add_batch",
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "Song batch added"
        );
        Ok(outcome)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Song>> {
        let row = sqlx::query(&format!("SELECT {SONG_COLUMNS} FROM song WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_song_row))
    }

    async fn get_by_genius_id(&self, genius_id: i64) -> Result<Option<Song>> {
        let row = sqlx::query(&format!(
            "SELECT {SONG_COLUMNS} FROM song WHERE genius_id = $1"
        ))
        .bind(genius_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_song_row))
    }

    async fn stats(&self) -> Result<CorpusStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) AS total_songs,
                COUNT(*) FILTER (WHERE processed) AS processed_songs,
                COUNT(*) FILTER (WHERE NOT processed) AS unprocessed_songs,
                (SELECT COUNT(*) FROM verse) AS total_verses
             FROM song",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(CorpusStats {
            total_songs: row.get::<i64, _>("total_songs"),
            processed_songs: row.get::<i64, _>("processed_songs"),
            unprocessed_songs: row.get::<i64, _>("unprocessed_songs"),
            total_verses: row.get::<i64, _>("total_verses"),
        })
    }
}
