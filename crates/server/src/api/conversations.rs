use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use palaver_core::domain::conversation::{validate_title, Conversation, ConversationId};
use palaver_core::domain::message::Message;
use palaver_core::errors::ApplicationError;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{correlation_id, ApiError};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::session::AuthUser;
use crate::api::state::AppState;
use crate::api::storage_failure;

pub const DEFAULT_PAGE_LIMIT: u32 = 100;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct NewConversation {
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Page {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl Page {
    pub fn bounds(&self) -> (u32, u32) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        (self.skip.unwrap_or(0), limit)
    }
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<NewConversation>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let correlation_id = correlation_id(&headers);
    let title = validate_title(&body.title)
        .map_err(|e| ApiError::new(ApplicationError::from(e), &correlation_id))?;

    let conversation = state
        .conversations
        .create(user.id, &title)
        .await
        .map_err(|e| ApiError::new(storage_failure(e), &correlation_id))?;

    info!(
        event_name = "conversation.created",
        correlation_id = %correlation_id,
        conversation_id = conversation.id.0,
        user_id = user.id.0,
        "conversation created"
    );
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
    ApiQuery(page): ApiQuery<Page>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let (skip, limit) = page.bounds();
    state
        .conversations
        .list_for_user(user.id, skip, limit)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(storage_failure(e), &correlation_id(&headers)))
}

pub async fn show(
    State(state): State<AppState>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<ConversationDetail>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let fail = |error: ApplicationError| ApiError::new(error, &correlation_id);

    let conversation = state
        .conversations
        .find_owned(ConversationId(id), user.id)
        .await
        .map_err(|e| fail(storage_failure(e)))?
        .ok_or_else(|| fail(ApplicationError::NotFoundOrForbidden))?;
    let messages = state
        .chat_store
        .list_messages(conversation.id)
        .await
        .map_err(|e| fail(storage_failure(e)))?;

    Ok(Json(ConversationDetail { conversation, messages }))
}

pub async fn delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let correlation_id = correlation_id(&headers);

    let deleted = state
        .conversations
        .delete_owned(ConversationId(id), user.id)
        .await
        .map_err(|e| ApiError::new(storage_failure(e), &correlation_id))?;
    if !deleted {
        return Err(ApiError::new(ApplicationError::NotFoundOrForbidden, &correlation_id));
    }

    info!(
        event_name = "conversation.deleted",
        correlation_id = %correlation_id,
        conversation_id = id,
        user_id = user.id.0,
        "conversation deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}
