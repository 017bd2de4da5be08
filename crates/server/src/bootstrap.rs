use std::sync::Arc;

use palaver_agent::{BudgetGuard, ChatRuntime, GeminiGateway};
use palaver_core::config::{AppConfig, ConfigError, LoadOptions};
use palaver_core::tokens::TokenEstimator;
use palaver_db::{
    connect_with_settings, migrations, DbPool, SqlChatStore, SqlConversationRepository,
    SqlUserRepository,
};
use thiserror::Error;
use tracing::info;

use crate::api::session::SessionKeys;
use crate::api::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm gateway unavailable: llm.api_key is not set")]
    Gateway,
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let estimator = TokenEstimator::load();
    info!(
        event_name = "system.bootstrap.estimator_ready",
        correlation_id = "bootstrap",
        strategy = estimator.strategy().as_str(),
        "token estimator initialized"
    );

    let gateway = GeminiGateway::from_config(&config.llm).ok_or(BootstrapError::Gateway)?;
    info!(
        event_name = "system.bootstrap.gateway_ready",
        correlation_id = "bootstrap",
        model = gateway.model(),
        "llm gateway initialized"
    );

    let chat_store = Arc::new(SqlChatStore::new(db_pool.clone()));
    let runtime = ChatRuntime::new(
        chat_store.clone(),
        Arc::new(gateway),
        BudgetGuard::new(estimator, config.chat.max_tokens_per_conversation),
    )
    .with_serialized_turns(config.chat.serialize_turns);

    let state = AppState {
        db_pool: db_pool.clone(),
        users: Arc::new(SqlUserRepository::new(db_pool.clone())),
        conversations: Arc::new(SqlConversationRepository::new(db_pool.clone())),
        chat_store,
        runtime: Arc::new(runtime),
        sessions: Arc::new(SessionKeys::from_config(&config.auth)),
        bcrypt_cost: config.auth.bcrypt_cost,
    };
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        max_tokens_per_conversation = config.chat.max_tokens_per_conversation,
        serialize_turns = config.chat.serialize_turns,
        "application components wired"
    );

    Ok(Application { config, db_pool, state })
}
