use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use palaver_core::domain::conversation::{Conversation, ConversationId};
use palaver_core::domain::message::Message;
use palaver_core::domain::user::{User, UserId};

pub mod chat;
pub mod conversation;
pub mod memory;
pub mod user;

pub use chat::SqlChatStore;
pub use conversation::SqlConversationRepository;
pub use memory::InMemoryChatStore;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("duplicate value for unique field `{0}`")]
    Duplicate(&'static str),
    #[error("record not found")]
    NotFound,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`RepositoryError::Duplicate`] when the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create(&self, user_id: UserId, title: &str) -> Result<Conversation, RepositoryError>;

    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: UserId,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<Conversation>, RepositoryError>;

    async fn find_owned(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<Conversation>, RepositoryError>;

    /// Returns `false` when nothing matched `(id, user_id)`.
    async fn delete_owned(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError>;
}

/// One user message and its reply, ready to be persisted together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewExchange {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub user_content: String,
    pub assistant_content: String,
    pub tokens: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedExchange {
    pub user_message: Message,
    pub assistant_message: Message,
    pub tokens_spent: i64,
}

/// Storage seen by the turn orchestrator.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn find_owned_conversation(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<Conversation>, RepositoryError>;

    /// Messages in `(created_at, id)` order. Rows with an unrecognized role
    /// are left out.
    async fn list_messages(&self, id: ConversationId) -> Result<Vec<Message>, RepositoryError>;

    /// Atomically re-checks ownership, appends both messages and adds
    /// `exchange.tokens` to the conversation counter. On any error nothing
    /// is written. A conversation that is gone or not owned yields
    /// [`RepositoryError::NotFound`].
    async fn commit_exchange(
        &self,
        exchange: NewExchange,
    ) -> Result<CommittedExchange, RepositoryError>;
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {e}")))
}

pub(crate) fn decode_err(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{connect_with_settings, migrations, DbPool};

    pub async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }
}
