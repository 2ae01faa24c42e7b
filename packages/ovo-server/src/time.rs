//! Wall-clock helper shared by the collection, cleaner, and topology.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used for `creation_date`/`update_date`
/// fields and TTL arithmetic throughout the storage and cluster layers.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
