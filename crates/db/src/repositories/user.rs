use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use palaver_core::domain::{storage_now, storage_timestamp};
use palaver_core::domain::user::{User, UserId};

use super::{decode_err, parse_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_err)?;
    let email: String = row.try_get("email").map_err(decode_err)?;
    let password_hash: String = row.try_get("password_hash").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(User { id: UserId(id), email, password_hash, created_at: parse_timestamp(&created_at)? })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, RepositoryError> {
        let created_at = storage_now();
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(storage_timestamp(&created_at))
        .execute(&self.pool)
        .await;

        let done = match result {
            Ok(done) => done,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(RepositoryError::Duplicate("email"))
            }
            Err(error) => return Err(error.into()),
        };

        Ok(User {
            id: UserId(done.last_insert_rowid()),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row =
            sqlx::query("SELECT id, email, password_hash, created_at FROM users WHERE id = ?")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(row_to_user).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::SqlUserRepository;
    use crate::repositories::test_support::migrated_pool;
    use crate::repositories::{RepositoryError, UserRepository};

    #[tokio::test]
    async fn create_then_find_by_email_and_id() {
        let repo = SqlUserRepository::new(migrated_pool().await);

        let created = repo.create("ana@example.com", "$2b$04$hash").await.expect("create");
        let by_email =
            repo.find_by_email("ana@example.com").await.expect("find").expect("present");
        let by_id = repo.find_by_id(created.id).await.expect("find").expect("present");

        assert_eq!(by_email.id, created.id);
        assert_eq!(by_id.email, "ana@example.com");
        assert_eq!(by_id.password_hash, "$2b$04$hash");
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let repo = SqlUserRepository::new(migrated_pool().await);
        repo.create("ana@example.com", "h1").await.expect("first");

        let second = repo.create("ana@example.com", "h2").await;

        assert!(matches!(second, Err(RepositoryError::Duplicate("email"))));
    }

    #[tokio::test]
    async fn unknown_user_is_none() {
        let repo = SqlUserRepository::new(migrated_pool().await);

        assert!(repo.find_by_email("ghost@example.com").await.expect("query").is_none());
    }
}
