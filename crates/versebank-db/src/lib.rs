//! # versebank-db
//!
//! PostgreSQL storage layer for versebank.
//!
//! This crate provides:
//! - Connection pool management
//! - Repositories for songs, verses, and the job queue
//! - The transactional pipeline store used by the batch jobs
//! - The lyric segmenter
//!
//! ## Example
//!
//! ```rust,ignore
//! use versebank_db::{Database, NewSong, SongRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/versebank").await?;
//!     let songs: Vec<NewSong> = serde_json::from_str(&std::fs::read_to_string("songs.json")?)?;
//!
//!     let outcome = db.songs.add_batch(&songs).await?;
//!     println!("inserted {}, skipped {}", outcome.inserted, outcome.skipped);
//!     Ok(())
//! }
//! ```
pub mod jobs;
pub mod pipeline;
pub mod pool;
pub mod segmenter;
pub mod songs;
pub mod verses;

// Test fixtures for integration tests
pub mod test_fixtures;

// Re-export core types
pub use versebank_core::*;

pub use jobs::PgJobRepository;
pub use pipeline::PgPipelineStore;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use segmenter::{segment_lyrics, SegmenterConfig, VerseSegmenter};
pub use songs::PgSongRepository;
pub use verses::PgVerseRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Song records.
    pub songs: PgSongRepository,
    /// Committed verses.
    pub verses: PgVerseRepository,
    /// Batch selection and transactional commit/teardown.
    pub pipeline: PgPipelineStore,
    /// Durable job queue.
    pub jobs: PgJobRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            songs: PgSongRepository::new(pool.clone()),
            verses: PgVerseRepository::new(pool.clone()),
            pipeline: PgPipelineStore::new(pool.clone()),
            jobs: PgJobRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
