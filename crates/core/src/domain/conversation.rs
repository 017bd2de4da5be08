use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::DomainError;

pub const MAX_TITLE_CHARS: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub title: String,
    /// Cumulative estimated tokens of every committed exchange. Only grows.
    pub tokens_spent: i64,
    pub created_at: DateTime<Utc>,
}

pub fn validate_title(raw: &str) -> Result<String, DomainError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(DomainError::BlankField { field: "title" });
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(DomainError::FieldTooLong { field: "title", max_chars: MAX_TITLE_CHARS });
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::{validate_title, MAX_TITLE_CHARS};
    use crate::errors::DomainError;

    #[test]
    fn title_is_trimmed() {
        assert_eq!(validate_title("  Trip planning ").as_deref(), Ok("Trip planning"));
    }

    #[test]
    fn blank_and_oversized_titles_are_rejected() {
        assert_eq!(validate_title("   "), Err(DomainError::BlankField { field: "title" }));
        let long = "x".repeat(MAX_TITLE_CHARS + 1);
        assert!(matches!(validate_title(&long), Err(DomainError::FieldTooLong { .. })));
    }
}
