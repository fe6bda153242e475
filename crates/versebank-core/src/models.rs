//! Core data models for versebank.
//!
//! These types are shared across all versebank crates: songs and their
//! verses, the job records that drive the pipeline, and the argument
//! payloads each job carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// SONG TYPES
// =============================================================================

/// A stored song lyric document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub id: Uuid,
    /// Stable external identifier; unique across the corpus.
    pub genius_id: i64,
    pub genre: String,
    pub artist: String,
    pub title: String,
    pub year: i32,
    pub lyrics: String,
    /// Featured artists, as free text.
    pub features: String,
    /// Popularity signal used by the batch selector.
    pub genius_views: i64,
    /// Whether verses have been extracted and embedded for this song.
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

/// A song record as supplied by the operator to `add_batch`.
///
/// Input files use camelCase keys (`geniusId`, `geniusViews`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSong {
    pub genre: String,
    pub artist: String,
    pub title: String,
    pub year: i32,
    pub lyrics: String,
    #[serde(default)]
    pub features: String,
    pub genius_views: i64,
    pub genius_id: i64,
}

/// Result of an `add_batch` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddBatchOutcome {
    /// Songs newly inserted.
    pub inserted: usize,
    /// Songs skipped because their `genius_id` already existed.
    pub skipped: usize,
}

/// Minimal projection returned by the unprocessed batch selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnprocessedSong {
    pub id: Uuid,
    pub lyrics: String,
}

/// Corpus counters shown by `versebank status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_songs: i64,
    pub processed_songs: i64,
    pub unprocessed_songs: i64,
    pub total_verses: i64,
}

// =============================================================================
// VERSE TYPES
// =============================================================================

/// Embedding vector type (re-exported from pgvector).
pub use pgvector::Vector;

/// A stored verse: one deduplicated lyric excerpt and its embedding.
#[derive(Debug, Clone)]
pub struct Verse {
    pub id: Uuid,
    pub song_id: Uuid,
    /// Order of first appearance within the song, starting at 0.
    pub position: i32,
    pub text: String,
    pub embedding: Vector,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// Verses computed for one song, ready to be committed.
///
/// `verses` is in first-appearance order; an empty list still marks the
/// song processed on commit.
#[derive(Debug, Clone)]
pub struct SongVerses {
    pub song_id: Uuid,
    pub verses: Vec<(String, Vector)>,
}

impl SongVerses {
    pub fn new(song_id: Uuid) -> Self {
        Self {
            song_id,
            verses: Vec::new(),
        }
    }
}

/// Summary of a `commit_verses` transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Songs flipped from unprocessed to processed by this commit.
    pub songs_committed: usize,
    /// Songs skipped because they were already processed or no longer exist.
    pub songs_skipped: usize,
    /// Verse rows inserted.
    pub verses_written: usize,
}

/// Summary of an unprocess or clear transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownSummary {
    /// Songs reset (unprocess) or deleted (clear).
    pub songs_affected: usize,
    /// Verse rows deleted.
    pub verses_deleted: usize,
}

// =============================================================================
// JOB TYPES
// =============================================================================

/// Status of a job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// True once the job will not run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Type of pipeline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Segment, embed, and commit a batch of unprocessed songs
    ProcessSongBatch,
    /// Delete verses and reset the processed flag for a page of songs
    UnprocessSongBatch,
    /// Delete verses and songs, one fixed-size page at a time
    ClearAll,
}

impl JobType {
    /// Every job type, in priority order.
    pub const ALL: [JobType; 3] = [
        JobType::ClearAll,
        JobType::UnprocessSongBatch,
        JobType::ProcessSongBatch,
    ];

    /// Default priority for this job type (higher = more urgent).
    pub fn default_priority(&self) -> i32 {
        match self {
            // Teardown outranks processing.
            JobType::ClearAll => 9,
            JobType::UnprocessSongBatch => 7,
            JobType::ProcessSongBatch => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::ProcessSongBatch => "process_song_batch",
            JobType::UnprocessSongBatch => "unprocess_song_batch",
            JobType::ClearAll => "clear_all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "process_song_batch" => Some(JobType::ProcessSongBatch),
            "unprocess_song_batch" => Some(JobType::UnprocessSongBatch),
            "clear_all" => Some(JobType::ClearAll),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job in the processing queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: Option<JsonValue>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub progress_percent: i32,
    pub progress_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    /// Earliest time a worker may claim the job.
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Queue statistics summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub completed_last_hour: i64,
    pub failed_last_hour: i64,
    pub total: i64,
}

// =============================================================================
// JOB PAYLOADS
// =============================================================================

fn default_limit() -> i64 {
    defaults::BATCH_LIMIT
}

fn default_min_views() -> i64 {
    defaults::BATCH_MIN_VIEWS
}

fn default_recursive() -> bool {
    true
}

/// Arguments for a `process_song_batch` job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSongBatchArgs {
    /// Maximum songs per invocation.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Only songs with at least this many views are selected.
    #[serde(default = "default_min_views")]
    pub min_views: i64,
    /// Schedule a successor with identical arguments after a non-empty batch.
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

impl Default for ProcessSongBatchArgs {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            min_views: default_min_views(),
            recursive: default_recursive(),
        }
    }
}

impl ProcessSongBatchArgs {
    pub fn validate(&self) -> Result<()> {
        if self.limit <= 0 {
            return Err(Error::InvalidInput(format!(
                "limit must be positive, got {}",
                self.limit
            )));
        }
        Ok(())
    }
}

/// Arguments for an `unprocess_song_batch` job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnprocessSongBatchArgs {
    /// Maximum songs per invocation.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Schedule a successor while pages come back full.
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

impl Default for UnprocessSongBatchArgs {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            recursive: default_recursive(),
        }
    }
}

impl UnprocessSongBatchArgs {
    pub fn validate(&self) -> Result<()> {
        if self.limit <= 0 {
            return Err(Error::InvalidInput(format!(
                "limit must be positive, got {}",
                self.limit
            )));
        }
        Ok(())
    }
}
