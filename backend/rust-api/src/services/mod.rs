use std::sync::Arc;

use crate::config::Config;
use cloud_store::{CloudStore, MemoryCloudStore, MongoCloudStore};
use local_store::{LocalStore, MemoryLocalStore, RedisLocalStore};
use mongodb::Client as MongoClient;
use quiz_manager::QuizManager;
use redis::aio::ConnectionManager;

pub struct AppState {
    pub config: Config,
    pub local: Arc<dyn LocalStore>,
    pub cloud: Arc<dyn CloudStore>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        let cloud = MongoCloudStore::new(mongo);
        if let Err(e) = cloud.ensure_indexes().await {
            tracing::warn!("Failed to ensure quiz history indexes: {}", e);
        }

        tracing::info!("Attempting to connect to Redis...");

        // Create ConnectionManager with longer timeout
        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        let local = RedisLocalStore::new(redis);
        tokio::time::timeout(std::time::Duration::from_secs(5), local.ping())
            .await
            .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        Ok(Self {
            config,
            local: Arc::new(local),
            cloud: Arc::new(cloud),
        })
    }

    /// State backed by in-process stores only.
    pub fn in_memory(config: Config) -> Self {
        Self {
            config,
            local: Arc::new(MemoryLocalStore::new()),
            cloud: Arc::new(MemoryCloudStore::new()),
        }
    }

    pub fn quiz_manager(&self, client_id: &str, user_id: Option<String>) -> QuizManager {
        QuizManager::new(self.local.clone(), self.cloud.clone(), client_id, user_id)
            .with_strict_lifecycle(self.config.strict_lifecycle)
    }
}

pub mod cloud_store;
pub mod error;
pub mod local_store;
pub mod quiz_manager;
