use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use super::error::{StoreError, StoreResult};
use crate::metrics::track_storage_operation;

const STORE_LABEL: &str = "local";

/// Device-scoped key-value storage holding serialized JSON records.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    async fn remove(&self, key: &str) -> StoreResult<()>;
    async fn ping(&self) -> StoreResult<()>;
}

/// Redis-backed local store. Keys never expire.
#[derive(Clone)]
pub struct RedisLocalStore {
    redis: ConnectionManager,
}

impl RedisLocalStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl LocalStore for RedisLocalStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.redis.clone();
        track_storage_operation(STORE_LABEL, "get", async {
            let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            Ok::<_, StoreError>(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.redis.clone();
        track_storage_operation(STORE_LABEL, "set", async {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .query_async::<()>(&mut conn)
                .await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.redis.clone();
        track_storage_operation(STORE_LABEL, "del", async {
            redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut conn)
                .await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.redis.clone();
        let reply = redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await?;
        if reply != "PONG" {
            return Err(StoreError::Unavailable(format!(
                "unexpected PING reply: {}",
                reply
            )));
        }
        Ok(())
    }
}

/// Process-local store used when Redis is not configured and in tests.
#[derive(Default)]
pub struct MemoryLocalStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_get_remove() {
        let store = MemoryLocalStore::new();
        assert_eq!(store.get("quiz:a:current_session").await.unwrap(), None);

        store.set("quiz:a:current_session", "{}").await.unwrap();
        store.set("quiz:a:current_session", "[]").await.unwrap();
        assert_eq!(
            store.get("quiz:a:current_session").await.unwrap().as_deref(),
            Some("[]")
        );

        store.remove("quiz:a:current_session").await.unwrap();
        assert_eq!(store.get("quiz:a:current_session").await.unwrap(), None);
        // removing a missing key is fine
        store.remove("quiz:a:current_session").await.unwrap();
    }
}
