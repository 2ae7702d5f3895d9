use std::collections::HashSet;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use super::cloud_store::CloudStore;
use super::local_store::LocalStore;
use crate::metrics::{record_quiz_event, ANSWERS_RECORDED_TOTAL};
use crate::models::{
    HistoryEntry, HistoryStats, NewQuiz, Question, QuizResults, QuizSession, QuizStatus,
};

/// Local history is capped at this many entries whenever a quiz is appended.
pub const HISTORY_LIMIT: usize = 50;
/// Upper bound applied by [`QuizManager::cleanup_history`].
pub const HISTORY_CLEANUP_LIMIT: usize = 100;
pub const DEFAULT_HISTORY_QUERY_LIMIT: usize = 20;

pub const LEGACY_IMPORT_TITLE: &str = "Imported Quiz";
pub const LEGACY_IMPORT_SOURCE: &str = "Legacy Import";

const SLOT_CURRENT: &str = "current_session";
const SLOT_HISTORY: &str = "history";
const SLOT_RESULTS: &str = "results";
const SLOT_LEGACY_QUESTIONS: &str = "questions";

/// Drives the quiz lifecycle for one client and bridges local and cloud storage.
///
/// Storage failures never escape: they are logged and the operation behaves as if
/// the data were absent.
pub struct QuizManager {
    local: Arc<dyn LocalStore>,
    cloud: Arc<dyn CloudStore>,
    client_id: String,
    user_id: Option<String>,
    strict_lifecycle: bool,
}

impl QuizManager {
    pub fn new(
        local: Arc<dyn LocalStore>,
        cloud: Arc<dyn CloudStore>,
        client_id: impl Into<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            local,
            cloud,
            client_id: client_id.into(),
            user_id,
            strict_lifecycle: false,
        }
    }

    /// With the strict lifecycle a completed quiz can no longer be restarted, answered or
    /// completed again, and history keeps one entry per quiz id.
    pub fn with_strict_lifecycle(mut self, strict: bool) -> Self {
        self.strict_lifecycle = strict;
        self
    }

    fn is_frozen(&self, session: &QuizSession) -> bool {
        if self.strict_lifecycle && session.is_completed() {
            tracing::warn!("Quiz {} is already completed, leaving it unchanged", session.id);
            return true;
        }
        false
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn key(&self, slot: &str) -> String {
        format!("quiz:{}:{}", self.client_id, slot)
    }

    async fn read_slot<T: DeserializeOwned>(&self, slot: &str) -> Option<T> {
        let key = self.key(slot);
        let raw = match self.local.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Discarding malformed data in {}: {}", key, e);
                None
            }
        }
    }

    async fn write_slot<T: Serialize>(&self, slot: &str, value: &T) -> bool {
        let key = self.key(slot);
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize {}: {}", key, e);
                return false;
            }
        };

        match self.local.set(&key, &json).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to write {}: {}", key, e);
                false
            }
        }
    }

    async fn remove_slot(&self, slot: &str) {
        let key = self.key(slot);
        if let Err(e) = self.local.remove(&key).await {
            tracing::warn!("Failed to remove {}: {}", key, e);
        }
    }

    /// Builds a new session and stores it as the current one.
    pub async fn create_quiz(&self, questions: Vec<Question>, options: NewQuiz) -> QuizSession {
        let session = QuizSession::new(NewQuiz {
            questions,
            ..options
        });
        self.save(&session).await;
        record_quiz_event("created");

        tracing::info!(
            "Quiz created: {} ({} questions) for client {}",
            session.id,
            session.questions.len(),
            self.client_id
        );
        session
    }

    /// Writes the session into the current-session slot. Failures are only logged.
    pub async fn save(&self, session: &QuizSession) {
        self.write_slot(SLOT_CURRENT, session).await;
    }

    pub async fn current_quiz(&self) -> Option<QuizSession> {
        self.read_slot(SLOT_CURRENT).await
    }

    pub async fn clear_current_quiz(&self) {
        self.remove_slot(SLOT_CURRENT).await;
        tracing::info!("Cleared current quiz for client {}", self.client_id);
    }

    pub async fn start_quiz(&self) -> Option<QuizSession> {
        let mut session = self.current_quiz().await?;
        if self.is_frozen(&session) {
            return Some(session);
        }
        session.start();
        self.save(&session).await;
        record_quiz_event("started");
        tracing::info!("Quiz started: {}", session.id);
        Some(session)
    }

    /// Records an answer on the current session. The flag reports whether the slot changed.
    pub async fn answer_question(
        &self,
        index: usize,
        answer: Option<usize>,
    ) -> Option<(QuizSession, bool)> {
        let mut session = self.current_quiz().await?;
        if self.is_frozen(&session) {
            return Some((session, false));
        }
        let applied = session.answer_question(index, answer);
        if applied {
            let correct = answer.is_some()
                && session
                    .questions
                    .get(index)
                    .is_some_and(|q| q.correct_answer == answer);
            ANSWERS_RECORDED_TOTAL
                .with_label_values(&[if correct { "true" } else { "false" }])
                .inc();
        }
        self.save(&session).await;
        Some((session, applied))
    }

    /// Completes the current session, persists it and records it in history.
    pub async fn complete_quiz(&self) -> Option<QuizResults> {
        let mut session = self.current_quiz().await?;
        if self.is_frozen(&session) {
            return Some(session.results());
        }
        let results = session.complete();
        self.save(&session).await;
        self.save_to_history(&session, &results).await;
        self.write_slot(SLOT_RESULTS, &HistoryEntry::new(&session, &results))
            .await;
        record_quiz_event("completed");

        tracing::info!(
            "Quiz completed: {} score={}% ({}/{})",
            session.id,
            results.percentage,
            results.correct_answers,
            results.total_questions
        );
        Some(results)
    }

    /// Prepends the snapshot to local history and mirrors it to the cloud for signed-in users.
    ///
    /// Completing a quiz twice appends it twice, unless the strict lifecycle is on,
    /// in which case the older entry with the same id is replaced. The cloud keeps
    /// one document per quiz id either way.
    pub async fn save_to_history(&self, session: &QuizSession, results: &QuizResults) {
        let entry = HistoryEntry::new(session, results);

        let mut history = self.local_history().await;
        if self.strict_lifecycle {
            history.retain(|existing| existing.id() != entry.id());
        }
        history.insert(0, entry.clone());
        history.truncate(HISTORY_LIMIT);
        self.write_slot(SLOT_HISTORY, &history).await;

        if let Some(user_id) = self.user_id.as_deref() {
            if let Err(e) = self.cloud.save_quiz(user_id, &entry).await {
                tracing::error!(
                    "Failed to save quiz {} to cloud for user {}: {}",
                    entry.id(),
                    user_id,
                    e
                );
            }
        }
    }

    pub async fn local_history(&self) -> Vec<HistoryEntry> {
        self.read_slot(SLOT_HISTORY).await.unwrap_or_default()
    }

    /// Local and cloud history merged by id, newest first.
    pub async fn quiz_history(&self, limit: usize) -> Vec<HistoryEntry> {
        let mut entries = self.local_history().await;

        if let Some(user_id) = self.user_id.as_deref() {
            match self.cloud.recent_quizzes(user_id, limit).await {
                Ok(remote) => entries.extend(remote),
                Err(e) => {
                    tracing::warn!("Failed to load cloud history for user {}: {}", user_id, e);
                }
            }
        }

        // local entries come first, so a repeated completion keeps its newest snapshot
        let mut seen = HashSet::new();
        entries.retain(|entry| seen.insert(entry.id().to_string()));

        entries.sort_by_key(|entry| std::cmp::Reverse(entry.created_at()));
        entries.truncate(limit);
        entries
    }

    /// Looks in the current slot, then local history, then the user's cloud documents.
    pub async fn get_quiz_by_id(&self, id: &str) -> Option<QuizSession> {
        if let Some(current) = self.current_quiz().await {
            if current.id == id {
                return Some(current);
            }
        }

        self.find_history_entry(id).await.map(|entry| entry.session)
    }

    async fn find_history_entry(&self, id: &str) -> Option<HistoryEntry> {
        if let Some(entry) = self
            .local_history()
            .await
            .into_iter()
            .find(|entry| entry.id() == id)
        {
            return Some(entry);
        }

        let user_id = self.user_id.as_deref()?;
        match self.cloud.find_quiz(user_id, id).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Failed to look up quiz {} in cloud: {}", id, e);
                None
            }
        }
    }

    /// Results of a completed quiz from history.
    pub async fn quiz_results(&self, id: &str) -> Option<QuizResults> {
        self.find_history_entry(id)
            .await
            .filter(|entry| entry.session.status == QuizStatus::Completed)
            .map(|entry| entry.results)
    }

    /// Snapshot written by the most recent completion on this client.
    pub async fn last_results(&self) -> Option<HistoryEntry> {
        self.read_slot(SLOT_RESULTS).await
    }

    pub async fn history_stats(&self, limit: usize) -> HistoryStats {
        HistoryStats::from_entries(&self.quiz_history(limit).await)
    }

    pub async fn cleanup_history(&self) {
        let mut history = self.local_history().await;
        if history.len() > HISTORY_CLEANUP_LIMIT {
            history.truncate(HISTORY_CLEANUP_LIMIT);
            self.write_slot(SLOT_HISTORY, &history).await;
            tracing::info!(
                "Trimmed local history for client {} to {} entries",
                self.client_id,
                HISTORY_CLEANUP_LIMIT
            );
        }
    }

    /// Wraps a pre-session question list into a session, once.
    ///
    /// Runs only when the legacy slot exists and there is no current session.
    pub async fn migrate_old_quiz_data(&self) -> Option<QuizSession> {
        if self.current_quiz().await.is_some() {
            return None;
        }

        let questions: Vec<Question> = self.read_slot(SLOT_LEGACY_QUESTIONS).await?;
        let session = self
            .create_quiz(
                questions,
                NewQuiz {
                    title: Some(LEGACY_IMPORT_TITLE.to_string()),
                    source: Some(LEGACY_IMPORT_SOURCE.to_string()),
                    ..Default::default()
                },
            )
            .await;
        self.remove_slot(SLOT_LEGACY_QUESTIONS).await;

        tracing::info!("Migrated legacy question list into quiz {}", session.id);
        Some(session)
    }
}
