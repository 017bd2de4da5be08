use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::warn;

use palaver_core::domain::conversation::{Conversation, ConversationId};
use palaver_core::domain::message::{Message, MessageId, Role};
use palaver_core::domain::user::UserId;
use palaver_core::domain::{storage_now, storage_timestamp};

use super::conversation::find_owned;
use super::{decode_err, parse_timestamp, ChatStore, CommittedExchange, NewExchange, RepositoryError};
use crate::DbPool;

pub struct SqlChatStore {
    pool: DbPool,
}

impl SqlChatStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// `Ok(None)` for a row whose role is not one we understand.
fn row_to_message(row: &SqliteRow) -> Result<Option<Message>, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_err)?;
    let conversation_id: i64 = row.try_get("conversation_id").map_err(decode_err)?;
    let role: String = row.try_get("role").map_err(decode_err)?;
    let content: String = row.try_get("content").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    let Some(role) = Role::parse(&role) else {
        warn!(
            event_name = "db.message.unknown_role",
            message_id = id,
            conversation_id,
            role = %role,
            "skipping stored message with unrecognized role"
        );
        return Ok(None);
    };

    Ok(Some(Message {
        id: MessageId(id),
        conversation_id: ConversationId(conversation_id),
        role,
        content,
        created_at: parse_timestamp(&created_at)?,
    }))
}

async fn insert_message(
    conn: &mut sqlx::SqliteConnection,
    conversation_id: ConversationId,
    role: Role,
    content: String,
) -> Result<Message, RepositoryError> {
    let created_at = storage_now();
    let done = sqlx::query(
        "INSERT INTO messages (conversation_id, role, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(conversation_id.0)
    .bind(role.as_str())
    .bind(&content)
    .bind(storage_timestamp(&created_at))
    .execute(&mut *conn)
    .await?;

    Ok(Message { id: MessageId(done.last_insert_rowid()), conversation_id, role, content, created_at })
}

#[async_trait::async_trait]
impl ChatStore for SqlChatStore {
    async fn find_owned_conversation(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        find_owned(&self.pool, id, user_id).await
    }

    async fn list_messages(&self, id: ConversationId) -> Result<Vec<Message>, RepositoryError> {
        let rows: Vec<SqliteRow> = sqlx::query(
            "SELECT id, conversation_id, role, content, created_at
             FROM messages
             WHERE conversation_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(message) = row_to_message(row)? {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    async fn commit_exchange(
        &self,
        exchange: NewExchange,
    ) -> Result<CommittedExchange, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Writing first takes the write lock up front and doubles as the
        // ownership re-check.
        let updated = sqlx::query(
            "UPDATE conversations SET tokens_spent = tokens_spent + ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(exchange.tokens)
        .bind(exchange.conversation_id.0)
        .bind(exchange.user_id.0)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound);
        }

        let user_message =
            insert_message(&mut *tx, exchange.conversation_id, Role::User, exchange.user_content)
                .await?;
        let assistant_message = insert_message(
            &mut *tx,
            exchange.conversation_id,
            Role::Assistant,
            exchange.assistant_content,
        )
        .await?;

        let tokens_spent: i64 =
            sqlx::query("SELECT tokens_spent FROM conversations WHERE id = ?")
                .bind(exchange.conversation_id.0)
                .fetch_one(&mut *tx)
                .await?
                .try_get("tokens_spent")
                .map_err(decode_err)?;

        tx.commit().await?;

        Ok(CommittedExchange { user_message, assistant_message, tokens_spent })
    }
}
