//! Default constants for the versebank pipeline.
//!
//! Every crate reads its fallback values from here rather than defining its
//! own magic numbers. Environment variables override most of them at runtime.

// =============================================================================
// SEGMENTATION
// =============================================================================

/// Segments with fewer whitespace-delimited tokens are discarded.
pub const SEGMENT_MIN_TOKENS: usize = 17;

/// Number of normalized tokens compared when deduplicating segments.
pub const SEGMENT_PREFIX_TOKENS: usize = 16;

// =============================================================================
// BATCH SELECTION
// =============================================================================

/// Default number of songs per process/unprocess invocation.
pub const BATCH_LIMIT: i64 = 10;

/// Default popularity threshold for the unprocessed selector.
pub const BATCH_MIN_VIEWS: i64 = 0;

/// Fixed page size used by the clear-all teardown job.
pub const CLEAR_PAGE_SIZE: i64 = 100;

/// Delay before a self-rescheduled successor becomes claimable.
pub const RESCHEDULE_DELAY_MS: u64 = 0;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Timeout for embedding requests in seconds.
///
/// One request carries every verse of a batch, so this is larger than a
/// single-text round trip would need.
pub const EMBED_TIMEOUT_SECS: u64 = 120;

/// Embedding calls slower than this are logged at WARN.
pub const EMBED_SLOW_THRESHOLD_MS: u64 = 5_000;

/// Default OpenAI-compatible API base URL.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default OpenAI embedding model.
pub const OPENAI_EMBED_MODEL: &str = "text-embedding-3-small";

/// Default dimension for text-embedding-3-small.
pub const OPENAI_EMBED_DIMENSION: usize = 1536;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Failed pipeline jobs are not retried automatically; a failure halts the chain.
pub const JOB_MAX_RETRIES: i32 = 0;

/// Default job worker poll interval in milliseconds.
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum concurrent jobs per worker.
///
/// One keeps invocations of a chain from overlapping.
pub const JOB_MAX_CONCURRENT: usize = 1;

/// Default job execution timeout in seconds (5 minutes).
pub const JOB_TIMEOUT_SECS: u64 = 300;

/// Capacity of the worker event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Finished jobs older than this many days are removed by `cleanup`.
pub const JOB_RETENTION_DAYS: i64 = 7;

/// Default number of jobs listed by `versebank jobs`.
pub const JOB_LIST_LIMIT: i64 = 20;

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of connections in the pool.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default maximum connection lifetime in seconds.
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segmentation_defaults_are_consistent() {
        const {
            assert!(SEGMENT_PREFIX_TOKENS < SEGMENT_MIN_TOKENS);
            assert!(SEGMENT_PREFIX_TOKENS > 0);
        }
    }

    #[test]
    fn batch_defaults_are_positive() {
        const {
            assert!(BATCH_LIMIT > 0);
            assert!(CLEAR_PAGE_SIZE > 0);
            assert!(BATCH_MIN_VIEWS >= 0);
        }
    }

    #[test]
    fn worker_defaults_are_sane() {
        const {
            assert!(JOB_MAX_CONCURRENT >= 1);
            assert!(JOB_POLL_INTERVAL_MS > 0);
            assert!(JOB_TIMEOUT_SECS * 1000 > EMBED_SLOW_THRESHOLD_MS);
        }
    }
}
