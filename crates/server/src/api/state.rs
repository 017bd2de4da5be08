use std::sync::Arc;

use axum::extract::FromRef;
use palaver_agent::ChatRuntime;
use palaver_db::{ChatStore, ConversationRepository, DbPool, UserRepository};

use crate::api::session::SessionKeys;
use crate::health::HealthState;

/// Shared handles built once at bootstrap and cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub users: Arc<dyn UserRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub chat_store: Arc<dyn ChatStore>,
    pub runtime: Arc<ChatRuntime>,
    pub sessions: Arc<SessionKeys>,
    pub bcrypt_cost: u32,
}

impl FromRef<AppState> for HealthState {
    fn from_ref(state: &AppState) -> Self {
        HealthState { db_pool: state.db_pool.clone() }
    }
}
