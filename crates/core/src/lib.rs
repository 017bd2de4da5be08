pub mod config;
pub mod domain;
pub mod errors;
pub mod tokens;

pub use domain::conversation::{Conversation, ConversationId};
pub use domain::message::{Message, MessageId, Role};
pub use domain::user::{User, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use tokens::{EstimatorStrategy, TokenEstimator};
