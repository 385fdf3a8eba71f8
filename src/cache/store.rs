//! Per-period dataset cache with independent expiry
//!
//! Entries are immutable once stored and handed out as `Arc`s, so a reader
//! racing with `put` or `invalidate_all` sees either the old entry or the new
//! one, never a partially written payload.

use super::clock::{Clock, SystemClock};
use crate::period::{FileFamily, Period};
use crate::schema::{DirectoryRecord, EnrollmentRecord};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cache key: family plus period, or the single latest directory snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Enrollment(Period),
    LatestDirectory,
}

impl CacheKey {
    pub fn family(&self) -> FileFamily {
        match self {
            CacheKey::Enrollment(_) => FileFamily::Enrollment,
            CacheKey::LatestDirectory => FileFamily::Directory,
        }
    }
}

/// Normalized records held by an entry
#[derive(Debug, Clone)]
pub enum CachedPayload {
    Enrollment(Arc<Vec<EnrollmentRecord>>),
    Directory(Arc<Vec<DirectoryRecord>>),
}

impl CachedPayload {
    pub fn len(&self) -> usize {
        match self {
            CachedPayload::Enrollment(records) => records.len(),
            CachedPayload::Directory(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One cached dataset
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: CachedPayload,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Valid while `now - fetched_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < self.ttl
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.fetched_at + self.ttl
    }
}

/// Time-to-live per family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub enrollment: Duration,
    pub directory: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            enrollment: Duration::hours(6),
            directory: Duration::hours(24),
        }
    }
}

impl CacheTtls {
    pub fn for_family(&self, family: FileFamily) -> Duration {
        match family {
            FileFamily::Enrollment => self.enrollment,
            FileFamily::Directory => self.directory,
        }
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Process-scoped cache of normalized datasets
///
/// Owns entry lifetime exclusively. The only external mutation besides
/// storing freshly fetched data is `invalidate_all`.
pub struct CacheManager {
    entries: RwLock<HashMap<CacheKey, Arc<CacheEntry>>>,
    clock: Arc<dyn Clock>,
    ttls: CacheTtls,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("entries", &self.read().len())
            .field("ttls", &self.ttls)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheTtls::default())
    }
}

impl CacheManager {
    /// Cache on the wall clock
    pub fn new(ttls: CacheTtls) -> Self {
        Self::with_clock(ttls, Arc::new(SystemClock))
    }

    /// Cache on an injected clock
    pub fn with_clock(ttls: CacheTtls, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            ttls,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, Arc<CacheEntry>>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, Arc<CacheEntry>>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn ttls(&self) -> CacheTtls {
        self.ttls
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fresh entry for `key`; expired entries are reported absent
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let now = self.clock.now();
        let entry = self.read().get(key).cloned();
        match entry {
            Some(entry) if entry.is_fresh(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            }
            Some(entry) => {
                debug!("Cache entry {:?} expired at {}", key, entry.expires_at());
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a payload, replacing any previous entry atomically
    pub fn put(&self, key: CacheKey, payload: CachedPayload, ttl: Duration) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            key,
            payload,
            fetched_at: self.clock.now(),
            ttl,
        });
        self.write().insert(key, Arc::clone(&entry));
        entry
    }

    /// Drop every entry; idempotent
    pub fn invalidate_all(&self) {
        let removed = {
            let mut entries = self.write();
            let n = entries.len();
            entries.clear();
            n
        };
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        info!("Cache invalidated ({} entries dropped)", removed);
    }

    /// Remove expired entries, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    pub fn get_enrollment(&self, period: Period) -> Option<Arc<Vec<EnrollmentRecord>>> {
        match &self.get(&CacheKey::Enrollment(period))?.payload {
            CachedPayload::Enrollment(records) => Some(Arc::clone(records)),
            CachedPayload::Directory(_) => None,
        }
    }

    pub fn put_enrollment(&self, period: Period, records: Vec<EnrollmentRecord>) -> Arc<Vec<EnrollmentRecord>> {
        let records = Arc::new(records);
        self.put(
            CacheKey::Enrollment(period),
            CachedPayload::Enrollment(Arc::clone(&records)),
            self.ttls.enrollment,
        );
        records
    }

    pub fn get_directory(&self) -> Option<Arc<Vec<DirectoryRecord>>> {
        match &self.get(&CacheKey::LatestDirectory)?.payload {
            CachedPayload::Directory(records) => Some(Arc::clone(records)),
            CachedPayload::Enrollment(_) => None,
        }
    }

    pub fn put_directory(&self, records: Vec<DirectoryRecord>) -> Arc<Vec<DirectoryRecord>> {
        let records = Arc::new(records);
        self.put(
            CacheKey::LatestDirectory,
            CachedPayload::Directory(Arc::clone(&records)),
            self.ttls.directory,
        );
        records
    }

    /// Number of stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}
