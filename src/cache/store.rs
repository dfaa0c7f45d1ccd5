//! Cache storage contract and the in-memory store.
//!
//! Stores know nothing about pages: keys are opaque, content is opaque bytes.
//! Entries carry an absolute expiry and are only returned while
//! `expires_at > now`; a stale read deletes the entry.

use std::io;
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use lru::LruCache;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use super::clock::Clock;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to prepare cache directory: {0}")]
    Init(io::Error),
    #[error("failed to write cache entry `{key}`: {source}")]
    Write {
        key: CacheKey,
        #[source]
        source: io::Error,
    },
    #[error("failed to delete cache entry `{key}`: {source}")]
    Delete {
        key: CacheKey,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode cache entry `{key}`: {source}")]
    Encode {
        key: CacheKey,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to list cache directory: {0}")]
    List(io::Error),
    #[error("cache clear incomplete: removed {removed}, failed {failed}")]
    Incomplete { removed: usize, failed: usize },
}

/// Key to (content, expiry) persistence.
pub trait CacheStore: Send + Sync {
    /// Content for `key` if present and unexpired.
    fn get(&self, key: &CacheKey) -> Option<Bytes>;

    /// Store `content` under `key` for `ttl_seconds`, replacing any prior entry.
    fn set(&self, key: &CacheKey, content: &[u8], ttl_seconds: u32) -> Result<(), StoreError>;

    /// Remove the entry; a missing entry is not an error.
    fn delete(&self, key: &CacheKey) -> Result<(), StoreError>;

    /// Remove every entry, returning how many were removed.
    fn clear_all(&self) -> Result<usize, StoreError>;

    /// Expiry of the stored entry, stale or not.
    fn expiration_of(&self, key: &CacheKey) -> Option<OffsetDateTime>;
}

pub(crate) fn expiry_after(now: OffsetDateTime, ttl_seconds: u32) -> OffsetDateTime {
    now + Duration::seconds(i64::from(ttl_seconds))
}

#[derive(Clone)]
struct MemoryEntry {
    content: Bytes,
    expires_at: OffsetDateTime,
}

/// LRU-bounded in-process store.
pub struct MemoryStore {
    entries: RwLock<LruCache<CacheKey, MemoryEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            clock,
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let entry = entries.get(key)?;
        if entry.expires_at > now {
            return Some(entry.content.clone());
        }
        entries.pop(key);
        None
    }

    fn set(&self, key: &CacheKey, content: &[u8], ttl_seconds: u32) -> Result<(), StoreError> {
        let entry = MemoryEntry {
            content: Bytes::copy_from_slice(content),
            expires_at: expiry_after(self.clock.now(), ttl_seconds),
        };
        rw_write(&self.entries, SOURCE, "set").put(key.clone(), entry);
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }

    fn clear_all(&self) -> Result<usize, StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "clear_all");
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }

    fn expiration_of(&self, key: &CacheKey) -> Option<OffsetDateTime> {
        rw_read(&self.entries, SOURCE, "expiration_of")
            .peek(key)
            .map(|entry| entry.expires_at)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;
    use crate::cache::clock::ManualClock;

    fn store_with_clock(capacity: usize) -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let capacity = NonZeroUsize::new(capacity).expect("non-zero capacity");
        (MemoryStore::new(capacity, clock.clone()), clock)
    }

    #[test]
    fn set_then_get_returns_content() {
        let (store, _) = store_with_clock(8);
        let key = CacheKey::single(42);

        store.set(&key, b"<html>42</html>", 1).expect("set succeeds");

        assert_eq!(store.get(&key), Some(Bytes::from_static(b"<html>42</html>")));
    }

    #[test]
    fn expired_entry_is_removed_on_read() {
        let (store, clock) = store_with_clock(8);
        let key = CacheKey::blog();

        store.set(&key, b"listing", 60).expect("set succeeds");
        clock.advance(Duration::seconds(60));

        assert!(store.get(&key).is_none());
        assert!(store.is_empty());
        assert!(store.expiration_of(&key).is_none());
    }

    #[test]
    fn overwrite_replaces_content_and_expiry() {
        let (store, clock) = store_with_clock(8);
        let key = CacheKey::home();

        store.set(&key, b"old", 60).expect("first set");
        let first_expiry = store.expiration_of(&key).expect("expiry recorded");
        clock.advance(Duration::seconds(10));
        store.set(&key, b"new", 60).expect("second set");

        assert_eq!(store.get(&key), Some(Bytes::from_static(b"new")));
        assert_eq!(
            store.expiration_of(&key),
            Some(first_expiry + Duration::seconds(10))
        );
    }

    #[test]
    fn delete_is_idempotent() {
        let (store, _) = store_with_clock(8);
        let key = CacheKey::single(7);

        store.delete(&key).expect("delete missing");
        store.set(&key, b"x", 60).expect("set");
        store.delete(&key).expect("delete present");
        store.delete(&key).expect("delete again");

        assert!(store.get(&key).is_none());
    }

    #[test]
    fn clear_all_reports_removed_entries() {
        let (store, _) = store_with_clock(8);
        for id in 0..3 {
            store.set(&CacheKey::single(id), b"x", 60).expect("set");
        }

        assert_eq!(store.clear_all().expect("clear"), 3);
        for id in 0..3 {
            assert!(store.get(&CacheKey::single(id)).is_none());
        }
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let (store, _) = store_with_clock(2);
        let (a, b, c) = (CacheKey::single(1), CacheKey::single(2), CacheKey::single(3));

        store.set(&a, b"a", 60).expect("set a");
        store.set(&b, b"b", 60).expect("set b");
        assert!(store.get(&a).is_some());
        store.set(&c, b"c", 60).expect("set c");

        assert!(store.get(&a).is_some());
        assert!(store.get(&b).is_none());
        assert!(store.get(&c).is_some());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let (store, _) = store_with_clock(4);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        let key = CacheKey::home();
        store.set(&key, b"still works", 60).expect("set after poison");
        assert!(store.get(&key).is_some());
    }
}
