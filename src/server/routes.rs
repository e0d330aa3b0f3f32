//! HTTP API routes

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::handler::{Failure, RequestOutcome};

fn default_user_id() -> String {
    "user".to_string()
}

/// Body of `POST /chat`
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Customer message
    #[serde(default)]
    pub message: String,
    /// Conversation owner
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

/// Successful `POST /chat` answer
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Assistant answer
    pub response: String,
}

/// Error body shared by every route
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Short summary
    pub error: String,
    /// Underlying cause
    pub details: String,
    /// HTTP status code, repeated for clients that only see the body
    pub status_code: u16,
}

/// Route error carrying its status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    details: String,
}

impl ApiError {
    fn bad_request(details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Invalid request",
            details: details.into(),
        }
    }
}

impl From<Failure> for ApiError {
    fn from(failure: Failure) -> Self {
        if failure.is_validation() {
            Self::bad_request(failure.message)
        } else {
            Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: "Failed to process message",
                details: failure.to_string(),
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error.to_string(),
            details: self.details,
            status_code: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

pub(super) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.toolbox.check().await {
        Ok(()) => Json(serde_json::json!({
            "status": "healthy",
            "toolbox_connected": true
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Tool server health check failed");
            Json(serde_json::json!({
                "status": "unhealthy",
                "toolbox_connected": false,
                "error": e.to_string()
            }))
        }
    }
}

pub(super) async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    match state.handler.handle(&request.user_id, &request.message).await {
        RequestOutcome::Success(response) => Ok(Json(ChatResponse { response })),
        RequestOutcome::RetryableFailure(failure) | RequestOutcome::TerminalFailure(failure) => {
            Err(failure.into())
        }
    }
}

pub(super) async fn reset_context(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let existed = state.handler.registry().reset(&user_id).await;
    let message = if existed {
        format!("Context reset for user {}", user_id)
    } else {
        format!("No context found for user {}", user_id)
    };
    Json(serde_json::json!({
        "status": "success",
        "message": message
    }))
}
