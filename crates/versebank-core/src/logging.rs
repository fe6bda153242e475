//! Structured logging field names shared by every versebank crate.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Job failed, chain halted, operator attention needed |
//! | WARN  | Recoverable issue (slow embedding call, skipped song) |
//! | INFO  | Lifecycle events and job completions |
//! | DEBUG | Decision points (reschedule or stop, page sizes) |
//! | TRACE | Per-song and per-verse iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "inference", "jobs", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pipeline", "segmenter", "ollama", "pool", "worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "commit_verses", "embed_texts", "claim_next"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Song UUID being operated on.
pub const SONG_ID: &str = "song_id";

/// Job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// Job type enum variant.
pub const JOB_TYPE: &str = "job_type";

/// Successor job scheduled by a self-rescheduling job.
pub const NEXT_JOB_ID: &str = "next_job_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of songs in a batch or page.
pub const SONG_COUNT: &str = "song_count";

/// Number of verses produced or written.
pub const VERSE_COUNT: &str = "verse_count";

/// Number of input texts sent to an embedding model.
pub const INPUT_COUNT: &str = "input_count";

/// Page size requested from the batch selector.
pub const LIMIT: &str = "limit";

/// Minimum popularity threshold for the batch selector.
pub const MIN_VIEWS: &str = "min_views";

// ─── Model fields ──────────────────────────────────────────────────────────

/// Embedding model name.
pub const MODEL: &str = "model";

/// Embedding vector dimension.
pub const DIMENSION: &str = "dimension";

// ─── Failure fields ────────────────────────────────────────────────────────

/// Variant label from `Error::kind`.
pub const ERROR_KIND: &str = "error_kind";
