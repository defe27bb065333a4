//! Sharded In-Memory Cache Engine
//!
//! The primary ("fast") tier of the proxy: a thread-safe, sharded map of
//! keys to values carrying memcached metadata (client flags and expiry).
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, we use multiple shards to reduce contention.
//! 2. **Lazy Expiry**: Entries are checked for expiry on access, plus background cleanup.
//! 3. **RwLock**: Allows multiple concurrent readers with exclusive writers.
//! 4. **Conditional Stores**: `add`/`replace`/`append`/`prepend` report whether their
//!    precondition held, so the handler layer can map the outcome onto the
//!    protocol error taxonomy without re-reading.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are distributed across shards by hash, so connections touching
//! different keys rarely contend on the same lock.

use crate::protocol::types::CacheEntry;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Number of shards for the storage engine.
/// More shards = less lock contention, but more memory overhead.
const NUM_SHARDS: usize = 64;

/// A stored value together with its expiry bookkeeping.
///
/// `exptime` is kept verbatim (the client-supplied seconds value) so reads
/// can echo it; `expires_at` is the resolved deadline used for expiry
/// checks. The protocol treats exptime as relative seconds, 0 = never.
#[derive(Debug, Clone)]
struct StoredEntry {
    data: Bytes,
    flags: u32,
    exptime: u32,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(data: Bytes, flags: u32, exptime: u32) -> Self {
        Self {
            data,
            flags,
            exptime,
            expires_at: deadline(Instant::now(), exptime),
        }
    }

    #[inline]
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }

    fn retime(&mut self, exptime: u32) {
        self.exptime = exptime;
        self.expires_at = deadline(Instant::now(), exptime);
    }

    fn to_cache_entry(&self) -> CacheEntry {
        CacheEntry {
            data: self.data.clone(),
            flags: self.flags,
            exptime: self.exptime,
        }
    }
}

/// Resolves a protocol exptime into an absolute deadline.
#[inline]
fn deadline(now: Instant, exptime: u32) -> Option<Instant> {
    if exptime == 0 {
        None
    } else {
        Some(now + Duration::from_secs(u64::from(exptime)))
    }
}

/// A single shard containing a portion of the key space.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<Bytes, StoredEntry>>,
}

/// Counters exposed for logging and tests.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Reads that found a live entry
    pub hits: AtomicU64,
    /// Reads that found nothing (or an expired entry)
    pub misses: AtomicU64,
    /// Entries reclaimed because their deadline passed
    pub expired: AtomicU64,
}

/// The sharded in-memory cache backing the primary tier.
///
/// Designed to be wrapped in an `Arc` and shared across all connection
/// tasks; every method takes `&self`.
#[derive(Debug)]
pub struct StorageEngine {
    shards: Vec<Shard>,
    stats: StorageStats,
}

impl StorageEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            stats: StorageStats::default(),
        }
    }

    /// Picks the shard responsible for a key.
    fn shard(&self, key: &[u8]) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Looks up a key, honoring lazy expiry.
    pub fn get(&self, key: &[u8]) -> Option<CacheEntry> {
        let shard = self.shard(key);

        // Fast path: read lock only.
        {
            let map = shard.data.read().unwrap();
            match map.get(key) {
                Some(entry) if !entry.is_expired() => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.to_cache_entry());
                }
                Some(_) => {} // expired, fall through to reclaim
                None => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // The entry expired: reclaim it under the write lock. Re-check in
        // case a concurrent writer replaced it in the meantime.
        let mut map = shard.data.write().unwrap();
        if let Some(entry) = map.get(key) {
            if entry.is_expired() {
                map.remove(key);
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.to_cache_entry());
            }
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores a value unconditionally.
    pub fn set(&self, key: Bytes, data: Bytes, flags: u32, exptime: u32) {
        let shard = self.shard(&key);
        let mut map = shard.data.write().unwrap();
        map.insert(key, StoredEntry::new(data, flags, exptime));
    }

    /// Stores a value only if the key is absent. Returns false if a live
    /// entry already exists.
    pub fn add(&self, key: Bytes, data: Bytes, flags: u32, exptime: u32) -> bool {
        let shard = self.shard(&key);
        let mut map = shard.data.write().unwrap();
        match map.get(&key) {
            Some(entry) if !entry.is_expired() => false,
            _ => {
                map.insert(key, StoredEntry::new(data, flags, exptime));
                true
            }
        }
    }

    /// Stores a value only if the key already exists. Returns false on a
    /// missing (or expired) key.
    pub fn replace(&self, key: Bytes, data: Bytes, flags: u32, exptime: u32) -> bool {
        let shard = self.shard(&key);
        let mut map = shard.data.write().unwrap();
        match map.get(&key) {
            Some(entry) if !entry.is_expired() => {
                map.insert(key, StoredEntry::new(data, flags, exptime));
                true
            }
            _ => false,
        }
    }

    /// Appends bytes to an existing value. Flags and expiry are untouched.
    /// Returns false if the key is missing.
    pub fn append(&self, key: &[u8], data: &[u8]) -> bool {
        self.splice(key, data, true)
    }

    /// Prepends bytes to an existing value. Flags and expiry are untouched.
    /// Returns false if the key is missing.
    pub fn prepend(&self, key: &[u8], data: &[u8]) -> bool {
        self.splice(key, data, false)
    }

    fn splice(&self, key: &[u8], data: &[u8], at_end: bool) -> bool {
        let shard = self.shard(key);
        let mut map = shard.data.write().unwrap();
        match map.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                let mut joined = BytesMut::with_capacity(entry.data.len() + data.len());
                if at_end {
                    joined.extend_from_slice(&entry.data);
                    joined.extend_from_slice(data);
                } else {
                    joined.extend_from_slice(data);
                    joined.extend_from_slice(&entry.data);
                }
                entry.data = joined.freeze();
                true
            }
            _ => false,
        }
    }

    /// Removes a key. Returns false if there was no live entry.
    pub fn delete(&self, key: &[u8]) -> bool {
        let shard = self.shard(key);
        let mut map = shard.data.write().unwrap();
        match map.remove(key) {
            Some(entry) if !entry.is_expired() => true,
            Some(_) => {
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
                false
            }
            None => false,
        }
    }

    /// Resets a key's expiry without reading it. Returns false on a miss.
    pub fn touch(&self, key: &[u8], exptime: u32) -> bool {
        let shard = self.shard(key);
        let mut map = shard.data.write().unwrap();
        match map.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.retime(exptime);
                true
            }
            _ => false,
        }
    }

    /// Reads a key and resets its expiry in one step.
    pub fn get_and_touch(&self, key: &[u8], exptime: u32) -> Option<CacheEntry> {
        let shard = self.shard(key);
        let mut map = shard.data.write().unwrap();
        match map.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.retime(exptime);
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.to_cache_entry())
            }
            _ => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Returns true if a live entry exists for the key.
    pub fn exists(&self, key: &[u8]) -> bool {
        let shard = self.shard(key);
        let map = shard.data.read().unwrap();
        matches!(map.get(key), Some(entry) if !entry.is_expired())
    }

    /// Number of entries currently held (expired-but-unswept included).
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.data.read().unwrap().len())
            .sum()
    }

    /// Returns true if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn flush(&self) {
        for shard in &self.shards {
            shard.data.write().unwrap().clear();
        }
    }

    /// Scans all shards and removes expired entries. Returns how many were
    /// reclaimed. Called by the background sweeper.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut map = shard.data.write().unwrap();
            let before = map.len();
            map.retain(|_, entry| !entry.is_expired());
            removed += before - map.len();
        }
        if removed > 0 {
            self.stats.expired.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Read-only view of the engine's counters.
    pub fn stats(&self) -> &StorageStats {
        &self.stats
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn set_then_get() {
        let engine = StorageEngine::new();
        engine.set(b("key"), b("foo"), 7, 0);

        let entry = engine.get(b"key").unwrap();
        assert_eq!(entry.data, b("foo"));
        assert_eq!(entry.flags, 7);
        assert_eq!(entry.exptime, 0);
    }

    #[test]
    fn get_missing_key() {
        let engine = StorageEngine::new();
        assert!(engine.get(b"nope").is_none());
        assert_eq!(engine.stats().misses.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn set_overwrites() {
        let engine = StorageEngine::new();
        engine.set(b("key"), b("one"), 0, 0);
        engine.set(b("key"), b("two"), 0, 0);
        assert_eq!(engine.get(b"key").unwrap().data, b("two"));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn add_only_when_absent() {
        let engine = StorageEngine::new();
        assert!(engine.add(b("key"), b("v1"), 0, 0));
        assert!(!engine.add(b("key"), b("v2"), 0, 0));
        assert_eq!(engine.get(b"key").unwrap().data, b("v1"));
    }

    #[test]
    fn replace_only_when_present() {
        let engine = StorageEngine::new();
        assert!(!engine.replace(b("key"), b("v1"), 0, 0));
        engine.set(b("key"), b("v1"), 0, 0);
        assert!(engine.replace(b("key"), b("v2"), 0, 0));
        assert_eq!(engine.get(b"key").unwrap().data, b("v2"));
    }

    #[test]
    fn append_and_prepend() {
        let engine = StorageEngine::new();
        assert!(!engine.append(b"key", b"x"));

        engine.set(b("key"), b("mid"), 3, 0);
        assert!(engine.append(b"key", b"-end"));
        assert!(engine.prepend(b"key", b"start-"));

        let entry = engine.get(b"key").unwrap();
        assert_eq!(entry.data, b("start-mid-end"));
        // Splices keep the original flags.
        assert_eq!(entry.flags, 3);
    }

    #[test]
    fn delete_reports_presence() {
        let engine = StorageEngine::new();
        assert!(!engine.delete(b"key"));
        engine.set(b("key"), b("v"), 0, 0);
        assert!(engine.delete(b"key"));
        assert!(engine.get(b"key").is_none());
    }

    #[test]
    fn expired_entry_behaves_as_missing() {
        let engine = StorageEngine::new();
        engine.set(b("key"), b("v"), 0, 1);

        // Force the deadline into the past instead of sleeping.
        {
            let shard = engine.shard(b"key");
            let mut map = shard.data.write().unwrap();
            map.get_mut(&b("key")).unwrap().expires_at =
                Some(Instant::now() - Duration::from_secs(1));
        }

        assert!(engine.get(b"key").is_none());
        // Lazy expiry removed the entry.
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.stats().expired.load(Ordering::Relaxed), 1);

        // Conditional stores see the key as absent too.
        engine.set(b("key"), b("v"), 0, 1);
        {
            let shard = engine.shard(b"key");
            let mut map = shard.data.write().unwrap();
            map.get_mut(&b("key")).unwrap().expires_at =
                Some(Instant::now() - Duration::from_secs(1));
        }
        assert!(!engine.replace(b("key"), b("v2"), 0, 0));
        assert!(engine.add(b("key"), b("v2"), 0, 0));
    }

    #[test]
    fn touch_retimes_entry() {
        let engine = StorageEngine::new();
        assert!(!engine.touch(b"key", 60));

        engine.set(b("key"), b("v"), 0, 1);
        assert!(engine.touch(b"key", 3600));
        assert_eq!(engine.get(b"key").unwrap().exptime, 3600);

        // Touch to "never expires".
        assert!(engine.touch(b"key", 0));
        assert_eq!(engine.get(b"key").unwrap().exptime, 0);
    }

    #[test]
    fn get_and_touch_reads_and_retimes() {
        let engine = StorageEngine::new();
        assert!(engine.get_and_touch(b"key", 60).is_none());

        engine.set(b("key"), b("v"), 5, 1);
        let entry = engine.get_and_touch(b"key", 120).unwrap();
        assert_eq!(entry.data, b("v"));
        assert_eq!(entry.flags, 5);
        assert_eq!(entry.exptime, 120);
    }

    #[test]
    fn cleanup_removes_only_expired() {
        let engine = StorageEngine::new();
        engine.set(b("live"), b("v"), 0, 0);
        engine.set(b("dead"), b("v"), 0, 1);
        {
            let shard = engine.shard(b"dead");
            let mut map = shard.data.write().unwrap();
            map.get_mut(&b("dead")).unwrap().expires_at =
                Some(Instant::now() - Duration::from_secs(1));
        }

        assert_eq!(engine.cleanup_expired(), 1);
        assert!(engine.exists(b"live"));
        assert!(!engine.exists(b"dead"));
    }

    #[test]
    fn flush_clears_everything() {
        let engine = StorageEngine::new();
        for i in 0..100 {
            engine.set(b(&format!("key{}", i)), b("v"), 0, 0);
        }
        assert_eq!(engine.len(), 100);
        engine.flush();
        assert!(engine.is_empty());
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let engine = Arc::new(StorageEngine::new());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for i in 0..1000 {
                        let key = Bytes::from(format!("key:{}:{}", t, i));
                        engine.set(key.clone(), Bytes::from("value"), 0, 0);
                        assert!(engine.get(&key).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 4000);
    }
}
