//! UUID v7 helpers.
//!
//! Songs, verses, and jobs all use time-ordered UUIDv7 keys so that
//! `ORDER BY id` pagination follows insertion order.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// # Example
///
/// ```
/// use versebank_core::uuid_utils::new_v7;
///
/// let a = new_v7();
/// let b = new_v7();
/// assert!(a < b);
/// ```
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Extract the creation timestamp embedded in a UUIDv7.
///
/// Returns `None` if the UUID is not version 7.
pub fn extract_timestamp(uuid: &Uuid) -> Option<DateTime<Utc>> {
    let bytes = uuid.as_bytes();
    if (bytes[6] >> 4) != 7 {
        return None;
    }

    let millis = bytes[..6]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | *b as u64);

    Utc.timestamp_millis_opt(millis as i64).single()
}
