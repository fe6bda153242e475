//! Verse repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use pgvector::Vector;
use versebank_core::{new_v7, Error, Result, Verse, VerseRepository};

/// PostgreSQL implementation of VerseRepository.
#[derive(Clone)]
pub struct PgVerseRepository {
    pool: Pool<Postgres>,
}

impl PgVerseRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_verse_row(row: PgRow) -> Verse {
        Verse {
            id: row.get("id"),
            song_id: row.get("song_id"),
            position: row.get("position"),
            text: row.get("text"),
            embedding: row.get("embedding"),
            model: row.get("model"),
            created_at: row.get("created_at"),
        }
    }

    /// Insert a song's verses within an existing transaction, numbering them
    /// from 0 in the given order.
    pub async fn store_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        song_id: Uuid,
        verses: &[(String, Vector)],
        model: &str,
    ) -> Result<usize> {
        let now = Utc::now();

        for (position, (text, embedding)) in verses.iter().enumerate() {
            sqlx::query(
                "INSERT INTO verse (id, song_id, position, text, embedding, model, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(new_v7())
            .bind(song_id)
            .bind(position as i32)
            .bind(text)
            .bind(embedding)
            .bind(model)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        Ok(verses.len())
    }

    /// Delete every verse owned by the listed songs. Returns rows removed.
    pub async fn delete_for_songs_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        song_ids: &[Uuid],
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM verse WHERE song_id = ANY($1)")
            .bind(song_ids)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl VerseRepository for PgVerseRepository {
    async fn list_for_song(&self, song_id: Uuid) -> Result<Vec<Verse>> {
        let rows = sqlx::query(
            "SELECT id, song_id, position, text, embedding, model, created_at
             FROM verse WHERE song_id = $1
             ORDER BY position",
        )
        .bind(song_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_verse_row).collect())
    }

    async fn count_for_song(&self, song_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verse WHERE song_id = $1")
            .bind(song_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(count)
    }
}
