use std::collections::HashMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    options::{FindOptions, ReplaceOptions},
    Collection, Database, IndexModel,
};
use tokio::sync::RwLock;

use super::error::{StoreError, StoreResult};
use crate::metrics::track_storage_operation;
use crate::models::HistoryEntry;

pub const QUIZ_HISTORY_COLLECTION: &str = "quiz_history";
const STORE_LABEL: &str = "cloud";

/// Per-user document storage for completed quizzes.
#[async_trait]
pub trait CloudStore: Send + Sync {
    /// Writes one document per quiz id; writing the same quiz again replaces it.
    async fn save_quiz(&self, user_id: &str, entry: &HistoryEntry) -> StoreResult<()>;
    async fn find_quiz(&self, user_id: &str, quiz_id: &str) -> StoreResult<Option<HistoryEntry>>;
    /// Most recent quizzes first, ordered by creation time.
    async fn recent_quizzes(&self, user_id: &str, limit: usize)
        -> StoreResult<Vec<HistoryEntry>>;
    async fn ping(&self) -> StoreResult<()>;
}

pub struct MongoCloudStore {
    db: Database,
}

impl MongoCloudStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> Collection<HistoryEntry> {
        self.db.collection(QUIZ_HISTORY_COLLECTION)
    }

    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "userId": 1, "createdAt": -1 })
            .build();
        self.collection().create_index(index).await?;

        let lookup = IndexModel::builder()
            .keys(doc! { "userId": 1, "id": 1 })
            .build();
        self.collection().create_index(lookup).await?;
        Ok(())
    }
}

#[async_trait]
impl CloudStore for MongoCloudStore {
    async fn save_quiz(&self, user_id: &str, entry: &HistoryEntry) -> StoreResult<()> {
        let mut document = entry.clone();
        document.user_id = Some(user_id.to_string());

        track_storage_operation(STORE_LABEL, "save_quiz", async {
            self.collection()
                .replace_one(doc! { "userId": user_id, "id": entry.id() }, &document)
                .with_options(ReplaceOptions::builder().upsert(true).build())
                .await?;
            Ok::<_, StoreError>(())
        })
        .await?;

        tracing::debug!("Stored quiz {} for user {}", entry.id(), user_id);
        Ok(())
    }

    async fn find_quiz(&self, user_id: &str, quiz_id: &str) -> StoreResult<Option<HistoryEntry>> {
        track_storage_operation(STORE_LABEL, "find_quiz", async {
            let entry = self
                .collection()
                .find_one(doc! { "userId": user_id, "id": quiz_id })
                .await?;
            Ok::<_, StoreError>(entry)
        })
        .await
    }

    async fn recent_quizzes(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<HistoryEntry>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .build();

        track_storage_operation(STORE_LABEL, "recent_quizzes", async {
            let cursor = self
                .collection()
                .find(doc! { "userId": user_id })
                .with_options(options)
                .await?;
            let entries: Vec<HistoryEntry> = cursor.try_collect().await?;
            Ok::<_, StoreError>(entries)
        })
        .await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

/// In-process cloud store keyed by user id.
#[derive(Default)]
pub struct MemoryCloudStore {
    quizzes: RwLock<HashMap<String, Vec<HistoryEntry>>>,
}

impl MemoryCloudStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CloudStore for MemoryCloudStore {
    async fn save_quiz(&self, user_id: &str, entry: &HistoryEntry) -> StoreResult<()> {
        let mut document = entry.clone();
        document.user_id = Some(user_id.to_string());

        let mut quizzes = self.quizzes.write().await;
        let entries = quizzes.entry(user_id.to_string()).or_default();
        match entries.iter_mut().find(|existing| existing.id() == entry.id()) {
            Some(existing) => *existing = document,
            None => entries.push(document),
        }
        Ok(())
    }

    async fn find_quiz(&self, user_id: &str, quiz_id: &str) -> StoreResult<Option<HistoryEntry>> {
        Ok(self
            .quizzes
            .read()
            .await
            .get(user_id)
            .and_then(|entries| entries.iter().find(|entry| entry.id() == quiz_id))
            .cloned())
    }

    async fn recent_quizzes(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<HistoryEntry>> {
        let mut entries = self
            .quizzes
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        entries.sort_by_key(|entry| std::cmp::Reverse(entry.created_at()));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
