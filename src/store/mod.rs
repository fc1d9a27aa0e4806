use std::time::Duration;

mod mem_store;
#[allow(unused_imports)]
pub use mem_store::*;

#[cfg(feature = "redis-store")]
pub mod redis_store;

/// [SlidingWindowStore] is the shared store holding, per key,
/// an ordered set of request entries scored by their insertion time
/// (milliseconds since the epoch), such as a sorted set in Redis ([redis_store::RedisStore])
/// or a map of ordered sets in memory ([MemStore]).
///
/// All methods are implemented in an async manner.
#[async_trait::async_trait]
pub trait SlidingWindowStore: Send + Sync {
    /// [Error] represents any failure talking to
    /// or executing against the store.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The [slide] function records one request for `key`
    /// and returns the number of live entries, in one batch:
    ///
    /// 1. remove every entry scored strictly below `now - window`;
    /// 2. insert a new entry scored `now` under a fresh unique token;
    /// 3. count all entries of `key`, including the new one.
    ///
    /// On error nothing is recorded and no count is returned.
    async fn slide(&self, key: &str, window: Duration) -> Result<u64, Self::Error>;
}

/// Current time in milliseconds since the epoch, used as entry score.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Lower bound of the live range for a window ending at `now`.
pub(crate) fn cutoff_millis(now: i64, window: Duration) -> i64 {
    now.saturating_sub(i64::try_from(window.as_millis()).unwrap_or(i64::MAX))
}
