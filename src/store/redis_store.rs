use std::sync::Arc;
use std::time::Duration;
use redis::{IntoConnectionInfo, RedisResult};
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use uuid::Uuid;
use crate::error::ConstructionError;
use crate::store::{cutoff_millis, now_millis, SlidingWindowStore};

/// [RedisStore] stores each window as a redis sorted set:
/// members are unique request tokens, scores are insertion times in milliseconds.
///
/// Every process pointing at the same redis shares the same counts.
#[derive(Clone)]
pub struct RedisStore {
    pub(crate) inner: Arc<RedisStoreInner>,
}

impl RedisStore {
    /// create from a [redis::Client]
    pub fn from_client(client: redis::Client) -> Self {
        Self {
            inner: Arc::new(RedisStoreInner {
                client,
                conn: OnceCell::new(),
            }),
        }
    }

    /// create from connection info such as `redis://127.0.0.1:6379`.
    pub fn open<T: IntoConnectionInfo>(info: T) -> Result<Self, ConstructionError> {
        let client = redis::Client::open(info)
            .map_err(|e| ConstructionError::InvalidStore(e.to_string()))?;
        Ok(Self::from_client(client))
    }
}

#[async_trait::async_trait]
impl SlidingWindowStore for RedisStore {
    type Error = redis::RedisError;

    async fn slide(&self, key: &str, window: Duration) -> Result<u64, Self::Error> {
        let mut conn = self.inner.conn().await?;

        let now = now_millis();
        let cutoff = cutoff_millis(now, window);
        let ttl = u64::try_from(window.as_millis()).unwrap_or(u64::MAX).max(1);

        // MULTI
        // ZREMRANGEBYSCORE {key} -inf ({cutoff}
        // ZADD {key} {now} {token}
        // ZCOUNT {key} -inf +inf ===> as the result
        // PEXPIRE {key} {window in milliseconds}
        // EXEC

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE").arg(key).arg("-inf").arg(format!("({}", cutoff)).ignore()
            .cmd("ZADD").arg(key).arg(now).arg(Uuid::new_v4().to_string()).ignore()
            .cmd("ZCOUNT").arg(key).arg("-inf").arg("+inf")
            .cmd("PEXPIRE").arg(key).arg(ttl).ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }
}

pub(crate) struct RedisStoreInner {
    /// the redis client
    pub client: redis::Client,
    /// shared connection, established on first use and reconnected on failure
    pub conn: OnceCell<ConnectionManager>,
}

impl RedisStoreInner {
    pub async fn conn(&self) -> RedisResult<ConnectionManager> {
        self.conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .cloned()
    }
}
