use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::title::derive_title;
use crate::utils::time::now_millis;

/// Default time limit for a quiz attempt (30 minutes).
pub const DEFAULT_TIME_LIMIT_SECONDS: u32 = 1800;

/// A single multiple-choice question.
///
/// Question sets come straight from the generator or from legacy storage and are
/// never validated. Any field that is missing or of the wrong shape falls back to
/// its default instead of rejecting the surrounding session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`. `None` never matches an answer.
    pub correct_answer: Option<usize>,
}

impl Question {
    fn from_value(value: &Value) -> Self {
        let options = match value.get("options") {
            Some(Value::Array(items)) => items.iter().map(option_text).collect(),
            _ => Vec::new(),
        };

        Question {
            question: value
                .get("question")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            options,
            correct_answer: value.get("correctAnswer").and_then(lenient_index),
        }
    }
}

impl<'de> Deserialize<'de> for Question {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(|value| Question::from_value(&value))
    }
}

/// Keeps option positions stable: non-string options become their JSON text.
fn option_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Non-negative integral indices only; anything else reads as "no answer".
fn lenient_index(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|index| usize::try_from(index).ok())
}

fn lenient_answers<'de, D>(deserializer: D) -> Result<Vec<Option<usize>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().map(lenient_index).collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// Input for [`QuizSession::new`]. Every field is optional and falls back to a default.
#[derive(Debug, Clone, Default)]
pub struct NewQuiz {
    pub id: Option<String>,
    pub questions: Vec<Question>,
    pub title: Option<String>,
    pub time_limit: Option<u32>,
    pub ai_generated: Option<bool>,
    pub source: Option<String>,
}

/// One attempt at a question set: `not_started -> in_progress -> completed`.
///
/// The session itself does not guard its transitions. Callers that want a
/// finished attempt frozen go through [`crate::services::quiz_manager::QuizManager`]
/// with the strict lifecycle enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    pub id: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: QuizStatus,
    #[serde(default)]
    pub current_question_index: usize,
    #[serde(default, deserialize_with = "lenient_answers")]
    pub answers: Vec<Option<usize>>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default = "default_time_limit")]
    pub time_limit: u32,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub ai_generated: bool,
    #[serde(default)]
    pub source: Option<String>,
}

fn default_time_limit() -> u32 {
    DEFAULT_TIME_LIMIT_SECONDS
}

/// Per-question outcome inside [`QuizResults`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question: String,
    pub user_answer: Option<usize>,
    pub correct_answer: Option<usize>,
    pub is_correct: bool,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResults {
    pub total_questions: usize,
    pub answered_questions: usize,
    pub correct_answers: usize,
    pub incorrect_answers: usize,
    pub percentage: u32,
    /// Milliseconds between start and end; `None` when the quiz was never started.
    pub time_taken: Option<i64>,
    pub question_results: Vec<QuestionResult>,
}

impl QuizSession {
    pub fn new(data: NewQuiz) -> Self {
        let title = match data.title.filter(|title| !title.trim().is_empty()) {
            Some(title) => title,
            None => derive_title(data.source.as_deref(), &data.questions),
        };

        Self {
            id: data.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            questions: data.questions,
            title,
            status: QuizStatus::NotStarted,
            current_question_index: 0,
            answers: Vec::new(),
            start_time: None,
            end_time: None,
            completed_at: None,
            time_limit: data.time_limit.unwrap_or(DEFAULT_TIME_LIMIT_SECONDS),
            created_at: now_millis(),
            ai_generated: data.ai_generated.unwrap_or(false),
            source: data.source,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == QuizStatus::Completed
    }

    /// Moves the session into progress and stamps the start time.
    ///
    /// Calling it again re-stamps `start_time`.
    pub fn start(&mut self) {
        self.status = QuizStatus::InProgress;
        self.start_time = Some(now_millis());
    }

    /// Records `answer` for question `index`. Returns `false` when the index is out of range.
    pub fn answer_question(&mut self, index: usize, answer: Option<usize>) -> bool {
        if index >= self.questions.len() {
            tracing::debug!(
                "Ignoring answer for out-of-range question {} in quiz {} ({} questions)",
                index,
                self.id,
                self.questions.len()
            );
            return false;
        }

        if self.answers.len() <= index {
            self.answers.resize(index + 1, None);
        }
        self.answers[index] = answer;
        self.current_question_index = self.current_question_index.max(index + 1);
        true
    }

    /// Finalizes the attempt and returns its results.
    ///
    /// Every call stamps `end_time` and `completed_at` again.
    pub fn complete(&mut self) -> QuizResults {
        let now = now_millis();
        self.status = QuizStatus::Completed;
        self.end_time = Some(now);
        self.completed_at = Some(now);
        self.results()
    }

    pub fn answer_at(&self, index: usize) -> Option<usize> {
        self.answers.get(index).copied().flatten()
    }

    pub fn results(&self) -> QuizResults {
        let mut answered = 0;
        let mut correct = 0;
        let mut incorrect = 0;

        let question_results: Vec<QuestionResult> = self
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let user_answer = self.answer_at(index);
                let is_correct = user_answer.is_some() && user_answer == question.correct_answer;

                if user_answer.is_some() {
                    answered += 1;
                    if is_correct {
                        correct += 1;
                    } else {
                        incorrect += 1;
                    }
                }

                QuestionResult {
                    question: question.question.clone(),
                    user_answer,
                    correct_answer: question.correct_answer,
                    is_correct,
                    options: question.options.clone(),
                }
            })
            .collect();

        let total = self.questions.len();
        let percentage = if total == 0 {
            0
        } else {
            ((correct as f64 / total as f64) * 100.0).round() as u32
        };

        let time_taken = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        };

        QuizResults {
            total_questions: total,
            answered_questions: answered,
            correct_answers: correct,
            incorrect_answers: incorrect,
            percentage,
            time_taken,
            question_results,
        }
    }

    /// Seconds left on the clock, or `None` if the quiz has not started.
    pub fn remaining_seconds(&self, now: i64) -> Option<u32> {
        let start = self.start_time?;
        let elapsed = ((now - start).max(0) / 1000) as u64;
        Some((self.time_limit as u64).saturating_sub(elapsed) as u32)
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    pub fn from_json(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

/// A completed session together with its computed results, kept for later review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub session: QuizSession,
    pub results: QuizResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl HistoryEntry {
    pub fn new(session: &QuizSession, results: &QuizResults) -> Self {
        Self {
            session: session.clone(),
            results: results.clone(),
            user_id: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.session.id
    }

    pub fn created_at(&self) -> i64 {
        self.session.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: usize) -> Question {
        Question {
            question: format!("Question with answer {}?", correct),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: Some(correct),
        }
    }

    fn session_with(correct: &[usize]) -> QuizSession {
        QuizSession::new(NewQuiz {
            questions: correct.iter().copied().map(question).collect(),
            title: Some("Test Quiz".into()),
            ..Default::default()
        })
    }

    #[test]
    fn test_new_session_defaults() {
        let session = session_with(&[0, 1]);
        assert_eq!(session.status, QuizStatus::NotStarted);
        assert_eq!(session.time_limit, DEFAULT_TIME_LIMIT_SECONDS);
        assert_eq!(session.current_question_index, 0);
        assert!(session.answers.is_empty());
        assert!(session.start_time.is_none());
        assert!(!session.ai_generated);
        assert!(session.created_at > 0);
        assert!(Uuid::parse_str(&session.id).is_ok());
    }

    #[test]
    fn test_mixed_answers_scoring() {
        let mut session = session_with(&[0, 1, 2, 3, 0]);
        session.start();
        for (index, answer) in [Some(0), Some(1), None, Some(3), Some(0)]
            .into_iter()
            .enumerate()
        {
            session.answer_question(index, answer);
        }
        // one wrong answer on the last slot
        session.answer_question(4, Some(2));

        let results = session.results();
        assert_eq!(results.total_questions, 5);
        assert_eq!(results.answered_questions, 4);
        assert_eq!(results.correct_answers, 3);
        assert_eq!(results.incorrect_answers, 1);
        assert_eq!(results.percentage, 60);
        assert!(!results.question_results[2].is_correct);
        assert_eq!(results.question_results[2].user_answer, None);
    }

    #[test]
    fn test_scoring_matches_answers_exactly() {
        let mut session = session_with(&[0, 1, 2, 3, 0]);
        for (index, answer) in [Some(0), Some(1), None, Some(3), Some(0)]
            .into_iter()
            .enumerate()
        {
            session.answer_question(index, answer);
        }

        let results = session.results();
        assert_eq!(results.correct_answers, 4);
        assert_eq!(results.answered_questions, 4);
        assert_eq!(results.incorrect_answers, 0);
        assert_eq!(results.percentage, 80);
    }

    #[test]
    fn test_every_question_is_in_exactly_one_bucket() {
        let mut session = session_with(&[0, 1, 2, 3, 0, 1, 2]);
        session.answer_question(0, Some(0));
        session.answer_question(1, Some(3));
        session.answer_question(5, Some(1));

        let results = session.results();
        let unanswered = results
            .question_results
            .iter()
            .filter(|r| r.user_answer.is_none())
            .count();
        assert_eq!(
            results.correct_answers + results.incorrect_answers + unanswered,
            results.total_questions
        );
        assert_eq!(results.total_questions, session.questions.len());
    }

    #[test]
    fn test_percentage_rounds() {
        let mut session = session_with(&[0, 0, 0]);
        session.answer_question(0, Some(0));
        session.answer_question(1, Some(0));
        assert_eq!(session.results().percentage, 67);
    }

    #[test]
    fn test_out_of_range_answer_is_ignored() {
        let mut session = session_with(&[0, 1]);
        session.answer_question(0, Some(0));

        assert!(!session.answer_question(2, Some(1)));
        assert!(!session.answer_question(usize::MAX, Some(1)));
        assert_eq!(session.answers, vec![Some(0)]);
        assert_eq!(session.current_question_index, 1);
    }

    #[test]
    fn test_cursor_never_moves_back() {
        let mut session = session_with(&[0, 1, 2, 3]);
        session.answer_question(2, Some(2));
        assert_eq!(session.current_question_index, 3);

        session.answer_question(0, Some(1));
        assert_eq!(session.current_question_index, 3);
        assert_eq!(session.answers, vec![Some(1), None, Some(2)]);

        // re-answering overwrites the slot
        session.answer_question(0, Some(0));
        assert_eq!(session.answer_at(0), Some(0));
        assert!(session.answers.len() <= session.questions.len());
    }

    #[test]
    fn test_start_then_complete() {
        let mut session = session_with(&[0]);
        session.start();
        assert_eq!(session.status, QuizStatus::InProgress);
        session.answer_question(0, Some(0));

        let results = session.complete();
        assert_eq!(session.status, QuizStatus::Completed);
        let (start, end) = (session.start_time.unwrap(), session.end_time.unwrap());
        assert!(end >= start);
        assert_eq!(session.completed_at, session.end_time);
        assert_eq!(results.time_taken, Some(end - start));
        assert_eq!(results.percentage, 100);
    }

    #[test]
    fn test_complete_without_start() {
        let mut session = QuizSession::new(NewQuiz::default());
        let results = session.complete();
        assert_eq!(results.total_questions, 0);
        assert_eq!(results.percentage, 0);
        assert_eq!(results.time_taken, None);
        assert!(session.start_time.is_none());
    }

    #[test]
    fn test_completed_session_is_not_guarded() {
        let mut session = session_with(&[0, 1]);
        session.start();
        session.answer_question(0, Some(0));
        session.complete();
        let first_end = session.end_time.unwrap();

        assert!(session.answer_question(1, Some(1)));
        assert_eq!(session.results().correct_answers, 2);

        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = session.complete();
        assert!(session.end_time.unwrap() > first_end);
        assert_eq!(session.completed_at, session.end_time);
        assert_eq!(second.percentage, 100);

        session.start();
        assert_eq!(session.status, QuizStatus::InProgress);
    }

    #[test]
    fn test_missing_correct_answer_is_never_correct() {
        let mut session = QuizSession::new(NewQuiz {
            questions: vec![Question {
                question: "Broken?".into(),
                options: vec![],
                correct_answer: None,
            }],
            ..Default::default()
        });
        session.answer_question(0, Some(0));
        let results = session.results();
        assert_eq!(results.correct_answers, 0);
        assert_eq!(results.incorrect_answers, 1);
    }

    #[test]
    fn test_malformed_questions_score_as_not_correct() {
        let value = serde_json::json!({
            "id": "mixed",
            "questions": [
                { "question": "Q1?", "options": ["a", "b"], "correctAnswer": "1" },
                { "question": "Q2?", "options": ["a", "b"], "correctAnswer": 0 },
                { "question": "Q3?", "options": ["a", 2, null], "correctAnswer": -1 },
                { "question": 4, "options": "a,b", "correctAnswer": 1.5 },
                "not a question"
            ],
            "answers": [1, 0, "2", null, 0]
        });

        let session = QuizSession::from_json(value).unwrap();
        assert_eq!(session.questions.len(), 5);
        assert_eq!(session.questions[0].correct_answer, None);
        assert_eq!(session.questions[1].correct_answer, Some(0));
        assert_eq!(session.questions[2].options, vec!["a", "2", ""]);
        assert_eq!(session.questions[2].correct_answer, None);
        assert_eq!(session.questions[3].question, "");
        assert!(session.questions[3].options.is_empty());
        assert_eq!(session.questions[4], Question::default());
        assert_eq!(session.answers, vec![Some(1), Some(0), None, None, Some(0)]);

        let results = session.results();
        assert_eq!(results.correct_answers, 1);
        assert_eq!(results.answered_questions, 3);
        assert!(!results.question_results[0].is_correct);
        assert!(results.question_results[1].is_correct);
        assert!(!results.question_results[4].is_correct);
    }

    #[test]
    fn test_json_round_trip() {
        let mut session = session_with(&[0, 1, 2]);
        session.start();
        session.answer_question(1, Some(1));

        let restored = QuizSession::from_json(session.to_json().unwrap()).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_json_uses_camel_case_and_fills_defaults() {
        let value = serde_json::json!({
            "id": "legacy",
            "questions": [{ "question": "Q?", "options": ["a", "b"], "correctAnswer": 1 }],
            "currentQuestionIndex": 1,
            "answers": [1],
            "status": "in_progress"
        });
        let session = QuizSession::from_json(value).unwrap();
        assert_eq!(session.time_limit, DEFAULT_TIME_LIMIT_SECONDS);
        assert_eq!(session.status, QuizStatus::InProgress);
        assert_eq!(session.results().correct_answers, 1);

        let json = session.to_json().unwrap();
        assert_eq!(json["timeLimit"], 1800);
        assert!(json["startTime"].is_null());
    }

    #[test]
    fn test_remaining_seconds() {
        let mut session = session_with(&[0]);
        assert_eq!(session.remaining_seconds(now_millis()), None);

        session.start();
        let start = session.start_time.unwrap();
        assert_eq!(session.remaining_seconds(start + 10_000), Some(1790));
        assert_eq!(session.remaining_seconds(start + 5_000_000), Some(0));
    }

    #[test]
    fn test_history_entry_flattens_session() {
        let mut session = session_with(&[0]);
        let results = session.complete();
        let entry = HistoryEntry::new(&session, &results);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], session.id.as_str());
        assert_eq!(json["status"], "completed");
        assert_eq!(json["results"]["totalQuestions"], 1);
        assert!(json.get("userId").is_none());

        let restored: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(restored, entry);
    }
}
