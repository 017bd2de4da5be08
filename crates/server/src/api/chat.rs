use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use palaver_agent::TurnRequest;
use palaver_core::domain::conversation::ConversationId;
use palaver_core::domain::message::Message;
use palaver_core::errors::ApplicationError;
use serde::{Deserialize, Serialize};

use crate::api::error::{correlation_id, ApiError};
use crate::api::extract::ApiJson;
use crate::api::session::AuthUser;
use crate::api::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub conversation_id: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub user_message: Message,
    pub assistant_message: Message,
    pub tokens_spent: i64,
    pub max_tokens: i64,
}

pub async fn send(
    State(state): State<AppState>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let request = TurnRequest {
        user_id: user.id,
        conversation_id: ConversationId(body.conversation_id),
        message: body.message,
        correlation_id: correlation_id.clone(),
    };

    let outcome = state
        .runtime
        .run_turn(request)
        .await
        .map_err(|e| ApiError::new(ApplicationError::from(e), &correlation_id))?;

    Ok(Json(ChatResponse {
        user_message: outcome.user_message,
        assistant_message: outcome.assistant_message,
        tokens_spent: outcome.tokens_spent,
        max_tokens: state.runtime.max_tokens(),
    }))
}
