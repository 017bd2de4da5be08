use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const PASSWORD_SPECIAL_CHARACTERS: [char; 7] = ['!', '@', '#', '$', '%', '&', '*'];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalizes and validates an email address, returning the stored form.
pub fn parse_email(raw: &str) -> Result<String, DomainError> {
    let email = normalize_email(raw);
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(DomainError::InvalidEmail);
    };

    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(DomainError::InvalidEmail);
    }

    Ok(email)
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(DomainError::WeakPassword("password must have at least 8 characters"));
    }
    if !password.chars().any(|ch| ch.is_ascii_digit()) {
        return Err(DomainError::WeakPassword("password must contain at least one digit"));
    }
    if !password.chars().any(char::is_uppercase) {
        return Err(DomainError::WeakPassword(
            "password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|ch| PASSWORD_SPECIAL_CHARACTERS.contains(&ch)) {
        return Err(DomainError::WeakPassword(
            "password must contain at least one special character (!@#$%&*)",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_email, validate_password};
    use crate::errors::DomainError;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(parse_email("  Ana.Souza@Example.COM ").as_deref(), Ok("ana.souza@example.com"));
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for raw in ["", "no-at-sign", "@example.com", "a@b", "a@@example.com", "a b@example.com"] {
            assert_eq!(parse_email(raw), Err(DomainError::InvalidEmail), "input: {raw:?}");
        }
    }

    #[test]
    fn password_policy_reports_first_missing_rule() {
        assert!(validate_password("Str0ng!pw").is_ok());

        let short = validate_password("S0!a");
        assert!(matches!(short, Err(DomainError::WeakPassword(msg)) if msg.contains("8 characters")));

        let no_digit = validate_password("Strong!pw");
        assert!(matches!(no_digit, Err(DomainError::WeakPassword(msg)) if msg.contains("digit")));

        let no_upper = validate_password("str0ng!pw");
        assert!(matches!(no_upper, Err(DomainError::WeakPassword(msg)) if msg.contains("uppercase")));

        let no_special = validate_password("Str0ngpw9");
        assert!(matches!(no_special, Err(DomainError::WeakPassword(msg)) if msg.contains("special")));
    }
}
