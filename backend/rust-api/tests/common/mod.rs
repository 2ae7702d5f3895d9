#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use quizdeck_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    services::AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret";

pub fn create_test_state() -> Arc<AppState> {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    Arc::new(AppState::in_memory(Config::in_memory(TEST_JWT_SECRET)))
}

pub fn create_test_app() -> Router {
    create_router(create_test_state())
}

pub fn new_client_id() -> String {
    format!("device-{}", Uuid::new_v4())
}

pub fn token_for(user_id: &str) -> String {
    JwtService::new(TEST_JWT_SECRET)
        .generate_token(JwtClaims::for_user(user_id, 3600))
        .unwrap()
}

pub fn sample_quiz_body() -> Value {
    json!({
        "questions": [
            { "question": "What is the capital of France?", "options": ["Paris", "Rome", "Berlin"], "correctAnswer": 0 },
            { "question": "Which planet is known as the red planet?", "options": ["Venus", "Mars"], "correctAnswer": 1 },
            { "question": "How many legs does a spider have?", "options": ["6", "8", "10"], "correctAnswer": 1 }
        ],
        "timeLimit": 600
    })
}

/// Sends a request scoped to `client_id` and returns the status plus the parsed JSON body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    client_id: Option<&str>,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(client_id) = client_id {
        builder = builder.header("x-client-id", client_id);
    }
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };

    (status, json)
}
