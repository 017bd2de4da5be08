use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use palaver_core::errors::{ApplicationError, InterfaceError};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reuses a caller-supplied request id, otherwise mints one.
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string())
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn new(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::BudgetExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        Self(value)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tokens_spent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let correlation_id = self.0.correlation_id().to_owned();

        match &self.0 {
            InterfaceError::ServiceUnavailable { message, .. }
            | InterfaceError::Internal { message, .. } => error!(
                event_name = "http.request.failed",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %message,
                "request failed"
            ),
            other => warn!(
                event_name = "http.request.rejected",
                correlation_id = %correlation_id,
                status = status.as_u16(),
                error = %other,
                "request rejected"
            ),
        }

        let (tokens_spent, max_tokens) = match &self.0 {
            InterfaceError::BudgetExceeded { tokens_spent, max_tokens, .. } => {
                (Some(*tokens_spent), Some(*max_tokens))
            }
            _ => (None, None),
        };

        let body =
            ErrorBody { detail: self.0.user_message(), correlation_id, tokens_spent, max_tokens };
        (status, Json(body)).into_response()
    }
}
