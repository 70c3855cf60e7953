//! Bounded in-memory LRU tier with optional time-to-live expiry.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{CacheKey, CachedScores, ResultCache};

struct Entry {
    scores: CachedScores,
    inserted_at: Instant,
}

struct Inner {
    map: HashMap<String, Entry>,
    /// Recency order, least recent at the front.
    order: VecDeque<String>,
}

/// Bounded LRU cache with optional TTL.
///
/// Eviction is by recency once `capacity` is exceeded. When a TTL is
/// set, entries whose age reaches it are treated as absent on read; a
/// TTL of zero makes every read a miss.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl MemoryCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    fn touch(order: &mut VecDeque<String>, key: &str) {
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
        order.push_back(key.to_string());
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<CachedScores> {
        let mut inner = self.inner.lock();

        let expired = match inner.map.get(key.as_str()) {
            None => return None,
            Some(entry) => self
                .ttl
                .is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl),
        };

        if expired {
            inner.map.remove(key.as_str());
            if let Some(pos) = inner.order.iter().position(|k| k == key.as_str()) {
                inner.order.remove(pos);
            }
            debug!(key = key.as_str(), "memory cache entry expired");
            return None;
        }

        Self::touch(&mut inner.order, key.as_str());
        inner.map.get(key.as_str()).map(|e| e.scores.clone())
    }

    fn put(&self, key: &CacheKey, scores: CachedScores) {
        if self.capacity == 0 {
            return;
        }

        let mut inner = self.inner.lock();
        inner.map.insert(
            key.as_str().to_string(),
            Entry {
                scores,
                inserted_at: Instant::now(),
            },
        );
        Self::touch(&mut inner.order, key.as_str());

        while inner.map.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.map.remove(&evicted);
                debug!(key = %evicted, "memory cache entry evicted");
            } else {
                break;
            }
        }
    }

    fn invalidate_all(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.order.clear();
    }
}
