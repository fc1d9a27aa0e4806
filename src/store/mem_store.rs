use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;
use crate::store::{cutoff_millis, now_millis, SlidingWindowStore};

pub const DEFAULT_STORE_CAPACITY: usize = 4096;

/// [Window] holds the entries of one key, ordered by score.
#[derive(Debug, Clone, Default)]
pub(crate) struct Window {
    pub entries: BTreeSet<(i64, Uuid)>,
    /// The window length used by the last slide.
    pub length: Duration,
}

impl Window {
    /// Drop every entry scored strictly below `cutoff`.
    pub fn evict(&mut self, cutoff: i64) {
        self.entries = self.entries.split_off(&(cutoff, Uuid::nil()));
    }

    /// Check if the newest entry has left the window at `now`.
    pub fn expired_at(&self, now: i64) -> bool {
        self.entries
            .last()
            .map_or(true, |&(score, _)| score < cutoff_millis(now, self.length))
    }
}

/// [MemStore] keeps the sliding windows in memory.
///
/// Counts are only shared between clones of the same [MemStore],
/// that is inside one process. Use it for tests and local development.
///
/// Once it holds `capacity` keys, idle windows are dropped before a new key is added.
#[derive(Debug, Clone)]
pub struct MemStore {
    pub(crate) inner: Arc<Mutex<MemStoreInner>>,
}

impl MemStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemStoreInner::new(capacity))),
        }
    }

    /// Number of entries currently held for `key`, expired or not.
    pub async fn len(&self, key: &str) -> usize {
        self.inner.lock().await
            .data
            .get(key)
            .map_or(0, |w| w.entries.len())
    }

    /// Remove keys whose every entry has left its window.
    pub async fn purge(&self) {
        self.inner.lock().await.purge(now_millis())
    }

    pub async fn clear(&self) {
        self.inner.lock().await.data.clear()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_CAPACITY)
    }
}

#[async_trait::async_trait]
impl SlidingWindowStore for MemStore {
    /// We don't have any error here.
    type Error = Infallible;

    async fn slide(&self, key: &str, window: Duration) -> Result<u64, Self::Error> {
        Ok(self.inner.lock().await.slide(key, window, now_millis()))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MemStoreInner {
    pub(crate) data: HashMap<String, Window>,
    /// number of keys above which idle windows are purged
    pub(crate) capacity: usize,
}

impl MemStoreInner {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn slide(&mut self, key: &str, length: Duration, now: i64) -> u64 {
        if self.data.len() >= self.capacity && !self.data.contains_key(key) {
            self.purge(now);
        }

        let window = self.data.entry(key.to_string()).or_default();

        window.length = length;
        window.evict(cutoff_millis(now, length));
        window.entries.insert((now, Uuid::new_v4()));
        window.entries.len() as u64
    }

    pub fn purge(&mut self, now: i64) {
        self.data.retain(|_, window| !window.expired_at(now))
    }
}
