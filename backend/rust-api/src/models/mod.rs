use serde::{Deserialize, Serialize};
use validator::Validate;

pub mod quiz;
pub mod timer;
pub mod title;

pub use quiz::{
    HistoryEntry, NewQuiz, Question, QuestionResult, QuizResults, QuizSession, QuizStatus,
};

/// Request body for creating a new quiz from a question set.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[serde(default)]
    pub questions: Vec<Question>,

    #[validate(length(max = 200, message = "Title must be at most 200 characters"))]
    pub title: Option<String>,

    #[validate(range(min = 1, max = 86400, message = "Time limit must be between 1 and 86400 seconds"))]
    pub time_limit: Option<u32>,

    pub ai_generated: Option<bool>,

    #[validate(length(max = 500, message = "Source must be at most 500 characters"))]
    pub source: Option<String>,
}

impl From<CreateQuizRequest> for NewQuiz {
    fn from(req: CreateQuizRequest) -> Self {
        NewQuiz {
            id: None,
            questions: req.questions,
            title: req.title,
            time_limit: req.time_limit,
            ai_generated: req.ai_generated,
            source: req.source,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAnswerRequest {
    pub index: usize,
    pub answer: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    pub applied: bool,
    pub session: QuizSession,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Aggregate view over a user's quiz history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_quizzes: usize,
    pub average_percentage: f64,
    pub best_percentage: u32,
    pub total_questions_answered: usize,
    pub total_correct_answers: usize,
}

impl HistoryStats {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let total_quizzes = entries.len();
        let average_percentage = if total_quizzes == 0 {
            0.0
        } else {
            entries
                .iter()
                .map(|entry| f64::from(entry.results.percentage))
                .sum::<f64>()
                / total_quizzes as f64
        };

        HistoryStats {
            total_quizzes,
            average_percentage,
            best_percentage: entries
                .iter()
                .map(|entry| entry.results.percentage)
                .max()
                .unwrap_or(0),
            total_questions_answered: entries
                .iter()
                .map(|entry| entry.results.answered_questions)
                .sum(),
            total_correct_answers: entries
                .iter()
                .map(|entry| entry.results.correct_answers)
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let req: CreateQuizRequest = serde_json::from_value(serde_json::json!({
            "questions": [],
            "timeLimit": 0
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req: CreateQuizRequest = serde_json::from_value(serde_json::json!({
            "timeLimit": 600,
            "source": "notes.pdf"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_history_stats_empty() {
        let stats = HistoryStats::from_entries(&[]);
        assert_eq!(stats.total_quizzes, 0);
        assert_eq!(stats.average_percentage, 0.0);
        assert_eq!(stats.best_percentage, 0);
    }

    #[test]
    fn test_history_stats_aggregates() {
        let entries: Vec<HistoryEntry> = [(vec![0, 1], vec![Some(0), Some(1)]), (vec![0, 1], vec![Some(0), Some(0)])]
            .into_iter()
            .map(|(correct, answers)| {
                let mut session = QuizSession::new(NewQuiz {
                    questions: correct
                        .into_iter()
                        .map(|c| Question {
                            question: "Q".into(),
                            options: vec!["a".into(), "b".into()],
                            correct_answer: Some(c),
                        })
                        .collect(),
                    title: Some("Stats".into()),
                    ..Default::default()
                });
                for (index, answer) in answers.into_iter().enumerate() {
                    session.answer_question(index, answer);
                }
                let results = session.complete();
                HistoryEntry::new(&session, &results)
            })
            .collect();

        let stats = HistoryStats::from_entries(&entries);
        assert_eq!(stats.total_quizzes, 2);
        assert_eq!(stats.best_percentage, 100);
        assert_eq!(stats.average_percentage, 75.0);
        assert_eq!(stats.total_questions_answered, 4);
        assert_eq!(stats.total_correct_answers, 3);
    }
}
