use axum::{
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(extractors::CLIENT_ID_HEADER),
        ])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest(
            "/api/v1/quizzes",
            quiz_routes()
                .layer(cors)
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::optional_auth_middleware,
                )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn quiz_routes() -> Router<Arc<AppState>> {
    use handlers::{quizzes, sse};

    Router::new()
        .route("/", post(quizzes::create_quiz))
        .route(
            "/current",
            get(quizzes::get_current_quiz).delete(quizzes::clear_current_quiz),
        )
        .route("/current/start", post(quizzes::start_quiz))
        .route("/current/answers", post(quizzes::submit_answer))
        .route("/current/complete", post(quizzes::complete_quiz))
        .route("/current/results", get(quizzes::get_current_results))
        .route("/current/stream", get(sse::quiz_timer_stream))
        .route("/history", get(quizzes::get_quiz_history))
        .route("/history/local", get(quizzes::get_local_history))
        .route("/history/stats", get(quizzes::get_history_stats))
        .route("/history/cleanup", post(quizzes::cleanup_history))
        .route("/results/last", get(quizzes::get_last_results))
        .route("/migrate", post(quizzes::migrate_legacy_quiz))
        .route("/{id}", get(quizzes::get_quiz))
        .route("/{id}/results", get(quizzes::get_quiz_results))
}
