use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("{0}")]
    WeakPassword(&'static str),
    #[error("{field} must not be blank")]
    BlankField { field: &'static str },
    #[error("{field} must be at most {max_chars} characters")]
    FieldTooLong { field: &'static str, max_chars: usize },
    #[error("unknown message role `{0}`")]
    UnknownRole(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Missing and not-owned are deliberately the same outcome.
    #[error("conversation not found or access denied")]
    NotFoundOrForbidden,
    #[error("token budget exhausted ({tokens_spent}/{max_tokens})")]
    BudgetExceeded { tokens_spent: i64, max_tokens: i64 },
    #[error("generation failure: {0}")]
    GenerationFailure(String),
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("authentication failed")]
    Unauthenticated,
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("budget exceeded: {tokens_spent}/{max_tokens}")]
    BudgetExceeded { tokens_spent: i64, max_tokens: i64, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text that is safe to return to the caller. Server-side failures never
    /// echo their internal message.
    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. }
            | Self::Unauthorized { message, .. }
            | Self::NotFound { message, .. } => message.clone(),
            Self::BudgetExceeded { tokens_spent, max_tokens, .. } => format!(
                "Token limit reached for this conversation. Tokens used: \
                 {tokens_spent}/{max_tokens}. Start a new conversation to continue."
            ),
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly.".to_string()
            }
            Self::Internal { .. } => "An unexpected internal error occurred.".to_string(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unauthorized { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::BudgetExceeded { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Unauthorized { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::BudgetExceeded { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Conflict(message) => Self::BadRequest { message, correlation_id },
            ApplicationError::Unauthenticated => Self::Unauthorized {
                message: "could not validate credentials".to_owned(),
                correlation_id,
            },
            ApplicationError::NotFoundOrForbidden => Self::NotFound {
                message: "conversation not found or access denied".to_owned(),
                correlation_id,
            },
            ApplicationError::BudgetExceeded { tokens_spent, max_tokens } => {
                Self::BudgetExceeded { tokens_spent, max_tokens, correlation_id }
            }
            ApplicationError::GenerationFailure(message)
            | ApplicationError::PersistenceFailure(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn domain_error_maps_to_bad_request_with_its_message() {
        let interface =
            ApplicationError::from(DomainError::BlankField { field: "title" }).into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, .. } if correlation_id == "req-1"
        ));
        assert_eq!(interface.user_message(), "title must not be blank");
    }

    #[test]
    fn not_found_or_forbidden_does_not_reveal_existence() {
        let interface = ApplicationError::NotFoundOrForbidden.into_interface("req-2");

        assert!(matches!(interface, InterfaceError::NotFound { .. }));
        assert_eq!(interface.user_message(), "conversation not found or access denied");
    }

    #[test]
    fn budget_rejection_carries_figures() {
        let interface =
            ApplicationError::BudgetExceeded { tokens_spent: 9990, max_tokens: 10000 }
                .into_interface("req-3");

        assert_eq!(
            interface,
            InterfaceError::BudgetExceeded {
                tokens_spent: 9990,
                max_tokens: 10000,
                correlation_id: "req-3".to_string(),
            }
        );
        assert!(interface.user_message().contains("9990/10000"));
    }

    #[test]
    fn generation_failure_hides_provider_detail() {
        let interface = ApplicationError::GenerationFailure("upstream 500: quota".to_owned())
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert!(!interface.user_message().contains("quota"));
        assert_eq!(interface.correlation_id(), "req-4");
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("missing key".to_owned()).into_interface("req-5");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
