//! Response bookkeeping shared by the HTTP embedding backends.

use std::time::Instant;

use tracing::{debug, warn};

use versebank_core::defaults;

/// Longest error body carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Log the outcome of an embedding call, warning when it ran slow.
pub(crate) fn log_embed_latency(start: Instant, input_count: usize, result_count: usize) {
    let duration_ms = start.elapsed().as_millis() as u64;
    debug!(result_count, duration_ms, "Embedding complete");
    if duration_ms > defaults::EMBED_SLOW_THRESHOLD_MS {
        warn!(duration_ms, input_count, slow = true, "Slow embedding call");
    }
}

/// First `MAX_ERROR_BODY_CHARS` characters of an error body, whitespace trimmed.
pub(crate) fn error_snippet(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
