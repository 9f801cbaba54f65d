use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Freshness window shared by every cache in this system.
pub const CACHE_TTL_SECS: i64 = 300; // 5 minutes

/// Injectable time source so expiry is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Outcome of a cache read. A stale entry is still returned; the caller
/// decides whether it is usable as a rate-limit fallback.
pub enum Lookup<T> {
    Fresh(T),
    Stale(T),
    Miss,
}

/// Keyed time-expiring store. Entries are replaced whole on `put`; expiry
/// is evaluated lazily on read, never swept; there is no capacity bound
/// because the key space is operator-controlled.
pub struct TtlCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_secs,
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Lookup<T> {
        match self.entries.get(key) {
            Some(entry) => {
                let age = (self.clock.now() - entry.cached_at).num_seconds();
                if age < self.ttl_secs {
                    Lookup::Fresh(entry.data.clone())
                } else {
                    Lookup::Stale(entry.data.clone())
                }
            }
            None => Lookup::Miss,
        }
    }

    pub fn put(&self, key: &str, data: T) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                cached_at: self.clock.now(),
            },
        );
    }
}
