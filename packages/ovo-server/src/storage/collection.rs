//! The concurrent, keyed object/counter store.
//!
//! `ConcurrentCollection` is the storage capability set; `DashMapCollection`
//! is the one concrete implementation, backed by two `DashMap`s (one for
//! objects, one for counters) so object and counter namespaces never
//! collide on the same key.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use ovo_core::{MetaCounter, MetaObject, MetaUpdateObject, OvoError, DEFAULT_COLLECTION};
use tokio::sync::Notify;

use crate::time::now_millis;

/// The storage capability set: every operation the collection must
/// expose, independent of how it is backed.
pub trait ConcurrentCollection: Send + Sync {
    fn put(&self, obj: MetaObject) -> Result<(), OvoError>;
    fn get(&self, key: &str) -> Option<MetaObject>;
    fn delete(&self, key: &str);
    fn delete_expired(&self, key: &str);
    fn get_and_remove(&self, key: &str) -> Option<MetaObject>;
    fn update_value_if_equal(&self, upd: &MetaUpdateObject) -> Result<(), OvoError>;
    fn update_kv_if_equal(&self, upd: &MetaUpdateObject) -> Result<(), OvoError>;
    fn update_key(&self, upd: &MetaUpdateObject) -> Result<(), OvoError>;
    fn touch(&self, key: &str, now_millis: i64) -> Result<(), OvoError>;
    fn delete_value_if_equal(&self, obj: &MetaObject) -> Result<(), OvoError>;
    fn count(&self) -> usize;
    fn list(&self) -> Vec<MetaObject>;
    fn keys(&self) -> Vec<String>;
    fn list_expired(&self) -> Vec<MetaObject>;

    fn increment(&self, c: &MetaCounter) -> MetaCounter;
    fn set_counter(&self, c: MetaCounter) -> MetaCounter;
    fn get_counter(&self, key: &str) -> Option<MetaCounter>;
    fn delete_counter(&self, key: &str);
    fn list_counters(&self) -> Vec<MetaCounter>;
}

/// `DashMap`-backed implementation. Compound operations use `DashMap`'s
/// per-shard entry API so the read-modify-write stays atomic per key
/// without serializing unrelated keys -- a sharded refinement over a
/// single coarse guard, preserving atomicity of each compound op.
pub struct DashMapCollection {
    objects: DashMap<String, MetaObject>,
    counters: DashMap<String, MetaCounter>,
    notify: Arc<Notify>,
    /// Millis deadline of the earliest known TTL expiry, or `0` if none is
    /// known. The cleaner uses this to shorten its sleep; a stale/missed
    /// value only delays an expiration, it never loses one.
    next_deadline: Arc<AtomicI64>,
}

impl DashMapCollection {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            objects: DashMap::new(),
            counters: DashMap::new(),
            notify: Arc::new(Notify::new()),
            next_deadline: Arc::new(AtomicI64::new(0)),
        })
    }

    /// Shared handle the cleaner waits on to be nudged.
    #[must_use]
    pub fn notify_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    /// Shared handle to the earliest known TTL deadline.
    #[must_use]
    pub fn next_deadline_handle(&self) -> Arc<AtomicI64> {
        Arc::clone(&self.next_deadline)
    }

    fn nudge(&self, deadline_millis: i64) {
        let prev = self.next_deadline.load(Ordering::Relaxed);
        if prev == 0 || deadline_millis < prev {
            self.next_deadline.store(deadline_millis, Ordering::Relaxed);
            self.notify.notify_one();
        }
    }
}

impl Default for DashMapCollection {
    fn default() -> Self {
        Self {
            objects: DashMap::new(),
            counters: DashMap::new(),
            notify: Arc::new(Notify::new()),
            next_deadline: Arc::new(AtomicI64::new(0)),
        }
    }
}

impl ConcurrentCollection for DashMapCollection {
    fn put(&self, mut obj: MetaObject) -> Result<(), OvoError> {
        if obj.key.is_empty() {
            return Err(OvoError::NullKey);
        }
        if obj.collection.is_empty() {
            obj.collection = DEFAULT_COLLECTION.to_string();
        }
        let now = now_millis();
        obj.creation_date = now;
        obj.update_date = now;
        let ttl = obj.ttl;
        self.objects.insert(obj.key.clone(), obj);
        if ttl > 0 {
            self.nudge(now + ttl as i64 * 1000);
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Option<MetaObject> {
        let now = now_millis();
        let entry = self.objects.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        Some(entry.clone())
    }

    fn delete(&self, key: &str) {
        self.objects.remove(key);
    }

    fn delete_expired(&self, key: &str) {
        let now = now_millis();
        self.objects.remove_if(key, |_, obj| obj.is_expired(now));
    }

    fn get_and_remove(&self, key: &str) -> Option<MetaObject> {
        let now = now_millis();
        let (_, obj) = self.objects.remove_if(key, |_, obj| !obj.is_expired(now))?;
        Some(obj)
    }

    fn update_value_if_equal(&self, upd: &MetaUpdateObject) -> Result<(), OvoError> {
        let mut entry = self.objects.get_mut(&upd.key).ok_or(OvoError::NotEqual)?;
        if entry.hash != upd.hash {
            return Err(OvoError::NotEqual);
        }
        entry.data = upd.new_data.clone();
        entry.update_date = now_millis();
        if upd.new_hash != 0 {
            entry.hash = upd.new_hash;
        }
        Ok(())
    }

    fn update_kv_if_equal(&self, upd: &MetaUpdateObject) -> Result<(), OvoError> {
        if upd.new_key.is_empty() {
            return Err(OvoError::NullKey);
        }
        if upd.new_key != upd.key && self.objects.contains_key(&upd.new_key) {
            return Err(OvoError::Conflict);
        }
        let mut existing = self.objects.remove_if(&upd.key, |_, obj| obj.hash == upd.hash);
        let Some((_, mut obj)) = existing.take() else {
            return Err(OvoError::NotEqual);
        };
        obj.key = upd.new_key.clone();
        obj.data = upd.new_data.clone();
        obj.update_date = now_millis();
        if upd.new_hash != 0 {
            obj.hash = upd.new_hash;
        }
        self.objects.insert(obj.key.clone(), obj);
        Ok(())
    }

    fn update_key(&self, upd: &MetaUpdateObject) -> Result<(), OvoError> {
        if upd.new_key.is_empty() {
            return Err(OvoError::NullKey);
        }
        let Some((_, mut obj)) = self.objects.remove(&upd.key) else {
            return Err(OvoError::NotFound);
        };
        obj.key = upd.new_key.clone();
        obj.update_date = now_millis();
        self.objects.insert(obj.key.clone(), obj);
        Ok(())
    }

    fn touch(&self, key: &str, now_millis: i64) -> Result<(), OvoError> {
        let mut entry = self.objects.get_mut(key).ok_or(OvoError::NotFound)?;
        entry.creation_date = now_millis;
        Ok(())
    }

    fn delete_value_if_equal(&self, obj: &MetaObject) -> Result<(), OvoError> {
        let removed = self.objects.remove_if(&obj.key, |_, stored| stored.hash == obj.hash);
        if removed.is_some() {
            Ok(())
        } else {
            Err(OvoError::NotEqual)
        }
    }

    fn count(&self) -> usize {
        self.objects.len()
    }

    fn list(&self) -> Vec<MetaObject> {
        self.objects.iter().map(|e| e.value().clone()).collect()
    }

    fn keys(&self) -> Vec<String> {
        self.objects.iter().map(|e| e.key().clone()).collect()
    }

    fn list_expired(&self) -> Vec<MetaObject> {
        let now = now_millis();
        self.objects.iter().filter(|e| e.is_expired(now)).map(|e| e.value().clone()).collect()
    }

    fn increment(&self, c: &MetaCounter) -> MetaCounter {
        let mut entry = self.counters.entry(c.key.clone()).or_insert_with(|| MetaCounter {
            key: c.key.clone(),
            collection: if c.collection.is_empty() { DEFAULT_COLLECTION.to_string() } else { c.collection.clone() },
            hash: c.hash,
            ttl: c.ttl,
            value: 0,
            creation_date: now_millis(),
        });
        entry.value += c.value;
        entry.clone()
    }

    fn set_counter(&self, mut c: MetaCounter) -> MetaCounter {
        if c.collection.is_empty() {
            c.collection = DEFAULT_COLLECTION.to_string();
        }
        c.creation_date = now_millis();
        self.counters.insert(c.key.clone(), c.clone());
        c
    }

    fn get_counter(&self, key: &str) -> Option<MetaCounter> {
        let now = now_millis();
        let entry = self.counters.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        Some(entry.clone())
    }

    fn delete_counter(&self, key: &str) {
        self.counters.remove(key);
    }

    fn list_counters(&self) -> Vec<MetaCounter> {
        self.counters.iter().map(|e| e.value().clone()).collect()
    }
}
