use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::middlewares::auth::JwtClaims;

/// Header naming the device whose local quiz storage a request works on.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Custom JSON extractor that returns JSON error responses instead of HTML
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = format!("Failed to parse JSON request body: {}", rejection);
                tracing::warn!("{}", message);
                Err(bad_request(message))
            }
        }
    }
}

/// Who is calling: the local storage namespace plus the signed-in user, if any.
///
/// Signed-in callers without an explicit client id share a namespace derived from
/// their user id; anonymous callers must send one.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub client_id: String,
    pub user_id: Option<String>,
}

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .extensions
            .get::<JwtClaims>()
            .map(|claims| claims.sub.clone());

        let header = parts
            .headers
            .get(CLIENT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| is_valid_client_id(value))
            .map(str::to_string);

        let client_id = match (header, &user_id) {
            (Some(client_id), _) => client_id,
            (None, Some(user_id)) => format!("user-{}", user_id),
            (None, None) => {
                return Err(bad_request(format!(
                    "Missing or invalid {} header",
                    CLIENT_ID_HEADER
                )))
            }
        };

        Ok(ClientContext { client_id, user_id })
    }
}

fn is_valid_client_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 128
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn bad_request(message: String) -> Response {
    let error_response = json!({
        "message": message,
        "status": 400
    });
    (StatusCode::BAD_REQUEST, Json(error_response)).into_response()
}
