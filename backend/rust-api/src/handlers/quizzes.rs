use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::{AppJson, ClientContext},
    models::{CreateQuizRequest, HistoryQuery, NewQuiz, SubmitAnswerRequest, SubmitAnswerResponse},
    services::{quiz_manager::DEFAULT_HISTORY_QUERY_LIMIT, AppState},
};

const MAX_HISTORY_QUERY_LIMIT: usize = 200;

#[derive(Debug)]
pub enum QuizApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl QuizApiError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        QuizApiError::BadRequest(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        QuizApiError::NotFound(message.into())
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        QuizApiError::Conflict(message.into())
    }

    fn no_current_quiz() -> Self {
        Self::not_found("No current quiz")
    }
}

impl IntoResponse for QuizApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            QuizApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            QuizApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            QuizApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        (
            status,
            Json(json!({ "message": message, "status": status.as_u16() })),
        )
            .into_response()
    }
}

fn history_limit(query: &HistoryQuery) -> usize {
    query
        .limit
        .unwrap_or(DEFAULT_HISTORY_QUERY_LIMIT)
        .clamp(1, MAX_HISTORY_QUERY_LIMIT)
}

/// POST /api/v1/quizzes
pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
    AppJson(req): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, QuizApiError> {
    req.validate()
        .map_err(|e| QuizApiError::bad_request(e.to_string()))?;

    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    let mut options = NewQuiz::from(req);
    let questions = std::mem::take(&mut options.questions);
    let session = manager.create_quiz(questions, options).await;

    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/quizzes/current
pub async fn get_current_quiz(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
) -> Result<impl IntoResponse, QuizApiError> {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    let session = manager
        .current_quiz()
        .await
        .ok_or_else(QuizApiError::no_current_quiz)?;
    Ok(Json(session))
}

/// DELETE /api/v1/quizzes/current
pub async fn clear_current_quiz(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
) -> StatusCode {
    state
        .quiz_manager(&ctx.client_id, ctx.user_id)
        .clear_current_quiz()
        .await;
    StatusCode::NO_CONTENT
}

/// POST /api/v1/quizzes/current/start
pub async fn start_quiz(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
) -> Result<impl IntoResponse, QuizApiError> {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    let session = manager
        .start_quiz()
        .await
        .ok_or_else(QuizApiError::no_current_quiz)?;
    Ok(Json(session))
}

/// POST /api/v1/quizzes/current/answers
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, QuizApiError> {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    let (session, applied) = manager
        .answer_question(req.index, req.answer)
        .await
        .ok_or_else(QuizApiError::no_current_quiz)?;
    Ok(Json(SubmitAnswerResponse { applied, session }))
}

/// POST /api/v1/quizzes/current/complete
pub async fn complete_quiz(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
) -> Result<impl IntoResponse, QuizApiError> {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    let results = manager
        .complete_quiz()
        .await
        .ok_or_else(QuizApiError::no_current_quiz)?;
    Ok(Json(results))
}

/// GET /api/v1/quizzes/current/results
pub async fn get_current_results(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
) -> Result<impl IntoResponse, QuizApiError> {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    let session = manager
        .current_quiz()
        .await
        .ok_or_else(QuizApiError::no_current_quiz)?;
    Ok(Json(session.results()))
}

/// GET /api/v1/quizzes/history
pub async fn get_quiz_history(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    Json(manager.quiz_history(history_limit(&query)).await)
}

/// GET /api/v1/quizzes/history/local
pub async fn get_local_history(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
) -> impl IntoResponse {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    Json(manager.local_history().await)
}

/// GET /api/v1/quizzes/history/stats
pub async fn get_history_stats(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    Json(manager.history_stats(history_limit(&query)).await)
}

/// POST /api/v1/quizzes/history/cleanup
pub async fn cleanup_history(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
) -> StatusCode {
    state
        .quiz_manager(&ctx.client_id, ctx.user_id)
        .cleanup_history()
        .await;
    StatusCode::NO_CONTENT
}

/// GET /api/v1/quizzes/results/last
pub async fn get_last_results(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
) -> Result<impl IntoResponse, QuizApiError> {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    let entry = manager
        .last_results()
        .await
        .ok_or_else(|| QuizApiError::not_found("No completed quiz on this client"))?;
    Ok(Json(entry))
}

/// POST /api/v1/quizzes/migrate
pub async fn migrate_legacy_quiz(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
) -> Response {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    match manager.migrate_old_quiz_data().await {
        Some(session) => (StatusCode::CREATED, Json(session)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /api/v1/quizzes/{id}
pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, QuizApiError> {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    let session = manager
        .get_quiz_by_id(&quiz_id)
        .await
        .ok_or_else(|| QuizApiError::not_found("Quiz not found"))?;
    Ok(Json(session))
}

/// GET /api/v1/quizzes/{id}/results
pub async fn get_quiz_results(
    State(state): State<Arc<AppState>>,
    ctx: ClientContext,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, QuizApiError> {
    let manager = state.quiz_manager(&ctx.client_id, ctx.user_id);
    let results = manager
        .quiz_results(&quiz_id)
        .await
        .ok_or_else(|| QuizApiError::not_found("No results for this quiz"))?;
    Ok(Json(results))
}
