use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| DomainError::UnknownRole(value.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Rejects blank chat input. Content is stored verbatim, surrounding
/// whitespace included.
pub fn validate_content(raw: &str) -> Result<(), DomainError> {
    if raw.trim().is_empty() {
        return Err(DomainError::BlankField { field: "message" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_content, Role};
    use crate::errors::DomainError;

    #[test]
    fn role_round_trips_through_storage_form() {
        for role in [Role::User, Role::Assistant] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse(" Assistant "), Some(Role::Assistant));
    }

    #[test]
    fn unknown_role_does_not_parse() {
        assert_eq!(Role::parse("system"), None);
        assert_eq!("tool".parse::<Role>(), Err(DomainError::UnknownRole("tool".to_string())));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).expect("serialize"), "\"assistant\"");
    }

    #[test]
    fn blank_content_is_rejected() {
        assert!(validate_content("hi").is_ok());
        assert_eq!(validate_content(" \n\t"), Err(DomainError::BlankField { field: "message" }));
    }
}
