use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use palaver_core::domain::conversation::{Conversation, ConversationId};
use palaver_core::domain::{storage_now, storage_timestamp};
use palaver_core::domain::user::UserId;

use super::{decode_err, parse_timestamp, ConversationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_conversation(row: &SqliteRow) -> Result<Conversation, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_err)?;
    let user_id: i64 = row.try_get("user_id").map_err(decode_err)?;
    let title: String = row.try_get("title").map_err(decode_err)?;
    let tokens_spent: i64 = row.try_get("tokens_spent").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(Conversation {
        id: ConversationId(id),
        user_id: UserId(user_id),
        title,
        tokens_spent,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub(crate) async fn find_owned<'e, E>(
    executor: E,
    id: ConversationId,
    user_id: UserId,
) -> Result<Option<Conversation>, RepositoryError>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT id, user_id, title, tokens_spent, created_at
         FROM conversations
         WHERE id = ? AND user_id = ?",
    )
    .bind(id.0)
    .bind(user_id.0)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(row_to_conversation).transpose()
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn create(&self, user_id: UserId, title: &str) -> Result<Conversation, RepositoryError> {
        let created_at = storage_now();
        let done = sqlx::query(
            "INSERT INTO conversations (user_id, title, tokens_spent, created_at)
             VALUES (?, ?, 0, ?)",
        )
        .bind(user_id.0)
        .bind(title)
        .bind(storage_timestamp(&created_at))
        .execute(&self.pool)
        .await?;

        Ok(Conversation {
            id: ConversationId(done.last_insert_rowid()),
            user_id,
            title: title.to_string(),
            tokens_spent: 0,
            created_at,
        })
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows: Vec<SqliteRow> = sqlx::query(
            "SELECT id, user_id, title, tokens_spent, created_at
             FROM conversations
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id.0)
        .bind(i64::from(limit))
        .bind(i64::from(skip))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_conversation).collect()
    }

    async fn find_owned(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        find_owned(&self.pool, id, user_id).await
    }

    async fn delete_owned(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let done = sqlx::query("DELETE FROM conversations WHERE id = ? AND user_id = ?")
            .bind(id.0)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;

        Ok(done.rows_affected() > 0)
    }
}
