use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use palaver_core::domain::conversation::{Conversation, ConversationId};
use palaver_core::domain::message::{Message, MessageId, Role};
use palaver_core::domain::storage_now;
use palaver_core::domain::user::UserId;

use super::{ChatStore, CommittedExchange, ConversationRepository, NewExchange, RepositoryError};

#[derive(Default)]
struct State {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    next_conversation_id: i64,
    next_message_id: i64,
}

/// Process-local store with the same observable semantics as the SQL one.
/// `fail_commits` makes every `commit_exchange` fail without writing.
#[derive(Default)]
pub struct InMemoryChatStore {
    state: RwLock<State>,
    fail_commits: AtomicBool,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Overwrites a conversation counter, for tests that start near the ceiling.
    pub async fn set_tokens_spent(&self, id: ConversationId, tokens_spent: i64) -> bool {
        let mut state = self.state.write().await;
        match state.conversations.iter_mut().find(|c| c.id == id) {
            Some(conversation) => {
                conversation.tokens_spent = tokens_spent;
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryChatStore {
    async fn create(&self, user_id: UserId, title: &str) -> Result<Conversation, RepositoryError> {
        let mut state = self.state.write().await;
        state.next_conversation_id += 1;
        let conversation = Conversation {
            id: ConversationId(state.next_conversation_id),
            user_id,
            title: title.to_string(),
            tokens_spent: 0,
            created_at: storage_now(),
        };
        state.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let state = self.state.read().await;
        let mut owned: Vec<Conversation> =
            state.conversations.iter().filter(|c| c.user_id == user_id).cloned().collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(owned.into_iter().skip(skip as usize).take(limit as usize).collect())
    }

    async fn find_owned(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        self.find_owned_conversation(id, user_id).await
    }

    async fn delete_owned(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let before = state.conversations.len();
        state.conversations.retain(|c| !(c.id == id && c.user_id == user_id));
        let deleted = state.conversations.len() != before;
        if deleted {
            state.messages.retain(|m| m.conversation_id != id);
        }
        Ok(deleted)
    }
}

#[async_trait::async_trait]
impl ChatStore for InMemoryChatStore {
    async fn find_owned_conversation(
        &self,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.conversations.iter().find(|c| c.id == id && c.user_id == user_id).cloned())
    }

    async fn list_messages(&self, id: ConversationId) -> Result<Vec<Message>, RepositoryError> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> =
            state.messages.iter().filter(|m| m.conversation_id == id).cloned().collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn commit_exchange(
        &self,
        exchange: NewExchange,
    ) -> Result<CommittedExchange, RepositoryError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(RepositoryError::Decode("injected commit failure".to_string()));
        }

        let mut state = self.state.write().await;
        let Some(index) = state.conversations.iter().position(|c| {
            c.id == exchange.conversation_id && c.user_id == exchange.user_id
        }) else {
            return Err(RepositoryError::NotFound);
        };

        let mut append = |role: Role, content: String| {
            state.next_message_id += 1;
            let message = Message {
                id: MessageId(state.next_message_id),
                conversation_id: exchange.conversation_id,
                role,
                content,
                created_at: storage_now(),
            };
            state.messages.push(message.clone());
            message
        };
        let user_message = append(Role::User, exchange.user_content);
        let assistant_message = append(Role::Assistant, exchange.assistant_content);

        let conversation = &mut state.conversations[index];
        conversation.tokens_spent += exchange.tokens;
        let tokens_spent = conversation.tokens_spent;

        Ok(CommittedExchange { user_message, assistant_message, tokens_spent })
    }
}
