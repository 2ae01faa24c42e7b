//! The storage data model: `MetaObject`, `MetaUpdateObject`, `MetaCounter`.

use serde::{Deserialize, Serialize};

/// Collection name substituted when a caller leaves it empty.
pub const DEFAULT_COLLECTION: &str = "default";

/// The unit of storage for the key-value side of the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaObject {
    pub key: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default, with = "serde_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub hash: i32,
    /// Seconds; `0` means no expiration.
    #[serde(default)]
    pub ttl: u64,
    /// Millis since the Unix epoch.
    #[serde(default)]
    pub creation_date: i64,
    #[serde(default)]
    pub update_date: i64,
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl MetaObject {
    #[must_use]
    pub fn new(key: impl Into<String>, data: Vec<u8>, collection: impl Into<String>, hash: i32, ttl: u64) -> Self {
        let collection = collection.into();
        Self {
            key: key.into(),
            collection: if collection.is_empty() { DEFAULT_COLLECTION.to_string() } else { collection },
            data,
            hash,
            ttl,
            creation_date: 0,
            update_date: 0,
        }
    }

    /// `is_expired ⇔ ttl > 0 ∧ now − creation_date > ttl` (ttl in seconds).
    #[must_use]
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.ttl > 0 && now_millis.saturating_sub(self.creation_date) > self.ttl as i64 * 1000
    }
}

/// Carries compare-and-swap intent: the current key/hash plus the desired
/// new key/data/hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaUpdateObject {
    pub key: String,
    #[serde(default)]
    pub new_key: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default, with = "serde_bytes")]
    pub data: Vec<u8>,
    #[serde(default, with = "serde_bytes")]
    pub new_data: Vec<u8>,
    #[serde(default)]
    pub hash: i32,
    #[serde(default)]
    pub new_hash: i32,
    /// Seconds; `0` means no expiration. Carried so a `Put` replicated via
    /// `Command`/`apply_command` preserves the original entry's TTL instead
    /// of reconstructing it as permanent on the receiving node.
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub creation_date: i64,
}

/// An atomic signed-integer counter, stored in a namespace distinct from
/// `MetaObject`s (the same key may exist in both without conflict).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaCounter {
    pub key: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub hash: i32,
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub creation_date: i64,
}

impl MetaCounter {
    #[must_use]
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.ttl > 0 && now_millis.saturating_sub(self.creation_date) > self.ttl as i64 * 1000
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn is_expired_never_fires_for_zero_ttl(creation_date: i64, now in 0i64..i64::MAX / 2) {
            let mut obj = MetaObject::new("k", vec![], "", 0, 0);
            obj.creation_date = creation_date;
            prop_assert!(!obj.is_expired(now));
        }

        #[test]
        fn is_expired_matches_elapsed_seconds(ttl in 1u64..100_000, elapsed_secs in 0i64..200_000) {
            let mut obj = MetaObject::new("k", vec![], "", 0, ttl);
            obj.creation_date = 0;
            let now = elapsed_secs.saturating_mul(1000);
            prop_assert_eq!(obj.is_expired(now), elapsed_secs > ttl as i64);
        }
    }
}
