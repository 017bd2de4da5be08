use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};

use palaver_core::domain::conversation::ConversationId;
use palaver_core::domain::message::{validate_content, Message};
use palaver_core::domain::user::UserId;
use palaver_core::errors::{ApplicationError, DomainError};
use palaver_db::repositories::{ChatStore, NewExchange, RepositoryError};

use crate::guardrails::BudgetGuard;
use crate::history::{assemble, DEFAULT_DIRECTIVE};
use crate::llm::{GatewayError, LlmGateway};

#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub message: String,
    pub correlation_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub user_message: Message,
    pub assistant_message: Message,
    /// Tokens charged for this turn.
    pub tokens_charged: i64,
    /// Conversation total after the charge.
    pub tokens_spent: i64,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    InvalidInput(#[from] DomainError),
    #[error("conversation not found or access denied")]
    NotFoundOrForbidden,
    #[error("token budget exhausted ({tokens_spent}/{max_tokens})")]
    BudgetExceeded { tokens_spent: i64, max_tokens: i64 },
    #[error("generation failed: {0}")]
    Generation(#[from] GatewayError),
    #[error("persistence failed: {0}")]
    Persistence(#[source] RepositoryError),
}

impl From<TurnError> for ApplicationError {
    fn from(value: TurnError) -> Self {
        match value {
            TurnError::InvalidInput(error) => Self::Domain(error),
            TurnError::NotFoundOrForbidden => Self::NotFoundOrForbidden,
            TurnError::BudgetExceeded { tokens_spent, max_tokens } => {
                Self::BudgetExceeded { tokens_spent, max_tokens }
            }
            TurnError::Generation(error) => Self::GenerationFailure(error.to_string()),
            TurnError::Persistence(error) => Self::PersistenceFailure(error.to_string()),
        }
    }
}

/// Hands out one async lock per conversation. Entries nobody holds or waits
/// on are pruned whenever a new lock is requested.
#[derive(Default)]
struct TurnLocks {
    locks: Mutex<HashMap<ConversationId, Arc<AsyncMutex<()>>>>,
}

impl TurnLocks {
    async fn acquire(&self, id: ConversationId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(id).or_default())
        };
        lock.lock_owned().await
    }
}

pub struct ChatRuntime {
    store: Arc<dyn ChatStore>,
    gateway: Arc<dyn LlmGateway>,
    guard: BudgetGuard,
    directive: String,
    turn_locks: Option<TurnLocks>,
}

impl ChatRuntime {
    pub fn new(store: Arc<dyn ChatStore>, gateway: Arc<dyn LlmGateway>, guard: BudgetGuard) -> Self {
        Self {
            store,
            gateway,
            guard,
            directive: DEFAULT_DIRECTIVE.to_string(),
            turn_locks: Some(TurnLocks::default()),
        }
    }

    /// With serialization off, concurrent turns on one conversation may all
    /// pass the budget check and jointly overshoot the ceiling.
    pub fn with_serialized_turns(mut self, serialize: bool) -> Self {
        self.turn_locks = serialize.then(TurnLocks::default);
        self
    }

    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = directive.into();
        self
    }

    pub fn max_tokens(&self) -> i64 {
        self.guard.ceiling()
    }

    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome, TurnError> {
        let TurnRequest { user_id, conversation_id, message, correlation_id } = request;
        validate_content(&message)?;

        let _turn_guard = match &self.turn_locks {
            Some(locks) => Some(locks.acquire(conversation_id).await),
            None => None,
        };

        let conversation = self
            .store
            .find_owned_conversation(conversation_id, user_id)
            .await
            .map_err(TurnError::Persistence)?
            .ok_or(TurnError::NotFoundOrForbidden)?;

        let decision = self.guard.check(conversation.tokens_spent, &message);
        if !decision.admitted {
            info!(
                event_name = "chat.turn.rejected",
                correlation_id = %correlation_id,
                conversation_id = conversation_id.0,
                user_id = user_id.0,
                tokens_spent = conversation.tokens_spent,
                projected_total = decision.projected_total,
                max_tokens = decision.ceiling,
                "turn rejected by token budget"
            );
            return Err(TurnError::BudgetExceeded {
                tokens_spent: conversation.tokens_spent,
                max_tokens: decision.ceiling,
            });
        }
        info!(
            event_name = "chat.turn.admitted",
            correlation_id = %correlation_id,
            conversation_id = conversation_id.0,
            user_id = user_id.0,
            tokens_spent = conversation.tokens_spent,
            candidate_tokens = decision.candidate_tokens,
            "turn admitted"
        );

        let history =
            self.store.list_messages(conversation_id).await.map_err(TurnError::Persistence)?;
        let prompt = assemble(&history, &self.directive, &message);

        let reply = match self.gateway.generate(&prompt).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "chat.turn.generation_failed",
                    correlation_id = %correlation_id,
                    conversation_id = conversation_id.0,
                    user_id = user_id.0,
                    error = %error,
                    "model call failed, nothing persisted"
                );
                return Err(error.into());
            }
        };

        let estimator = self.guard.estimator();
        let tokens_charged = estimator.estimate(&message) + estimator.estimate(&reply);
        let committed = self
            .store
            .commit_exchange(NewExchange {
                conversation_id,
                user_id,
                user_content: message,
                assistant_content: reply,
                tokens: tokens_charged,
            })
            .await
            .map_err(|error| {
                warn!(
                    event_name = "chat.turn.persist_failed",
                    correlation_id = %correlation_id,
                    conversation_id = conversation_id.0,
                    user_id = user_id.0,
                    error = %error,
                    "exchange rolled back"
                );
                match error {
                    RepositoryError::NotFound => TurnError::NotFoundOrForbidden,
                    other => TurnError::Persistence(other),
                }
            })?;

        info!(
            event_name = "chat.turn.committed",
            correlation_id = %correlation_id,
            conversation_id = conversation_id.0,
            user_id = user_id.0,
            tokens_charged,
            tokens_spent = committed.tokens_spent,
            "turn committed"
        );

        Ok(TurnOutcome {
            user_message: committed.user_message,
            assistant_message: committed.assistant_message,
            tokens_charged,
            tokens_spent: committed.tokens_spent,
        })
    }
}
