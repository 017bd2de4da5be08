use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use palaver_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

const UNSET: &str = "<unset>";
const REDACTED: &str = "<redacted>";

struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Entry {
    fn new(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.to_string(), env_keys }
    }
}

pub fn run() -> CommandResult {
    run_with(LoadOptions::default())
}

pub fn run_with(options: LoadOptions) -> CommandResult {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let config_file_path = explicit_path.or_else(detect_config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries(&config).into_iter().map(|entry| {
        let source = field_source(
            entry.key,
            entry.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        format!("- {} = {} (source: {source})", entry.key, entry.value)
    }));

    CommandResult::success("config", lines.join("\n"))
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    let api_key = if config.llm.api_key.is_some() { REDACTED } else { UNSET };
    let jwt_secret =
        if config.auth.jwt_secret.expose_secret().is_empty() { UNSET } else { REDACTED };

    vec![
        Entry::new("database.url", &config.database.url, &["PALAVER_DATABASE_URL"]),
        Entry::new(
            "database.max_connections",
            config.database.max_connections,
            &["PALAVER_DATABASE_MAX_CONNECTIONS"],
        ),
        Entry::new(
            "database.timeout_secs",
            config.database.timeout_secs,
            &["PALAVER_DATABASE_TIMEOUT_SECS"],
        ),
        Entry::new("llm.api_key", api_key, &["PALAVER_LLM_API_KEY", "GOOGLE_API_KEY"]),
        Entry::new("llm.base_url", &config.llm.base_url, &["PALAVER_LLM_BASE_URL"]),
        Entry::new("llm.model", &config.llm.model, &["PALAVER_LLM_MODEL"]),
        Entry::new("llm.temperature", config.llm.temperature, &["PALAVER_LLM_TEMPERATURE"]),
        Entry::new(
            "llm.max_output_tokens",
            config.llm.max_output_tokens,
            &["PALAVER_LLM_MAX_OUTPUT_TOKENS"],
        ),
        Entry::new(
            "chat.max_tokens_per_conversation",
            config.chat.max_tokens_per_conversation,
            &["PALAVER_CHAT_MAX_TOKENS_PER_CONVERSATION"],
        ),
        Entry::new(
            "chat.serialize_turns",
            config.chat.serialize_turns,
            &["PALAVER_CHAT_SERIALIZE_TURNS"],
        ),
        Entry::new("auth.jwt_secret", jwt_secret, &["PALAVER_AUTH_JWT_SECRET"]),
        Entry::new(
            "auth.token_ttl_minutes",
            config.auth.token_ttl_minutes,
            &["PALAVER_AUTH_TOKEN_TTL_MINUTES"],
        ),
        Entry::new("auth.cookie_secure", config.auth.cookie_secure, &["PALAVER_AUTH_COOKIE_SECURE"]),
        Entry::new("auth.bcrypt_cost", config.auth.bcrypt_cost, &["PALAVER_AUTH_BCRYPT_COST"]),
        Entry::new(
            "server.bind_address",
            &config.server.bind_address,
            &["PALAVER_SERVER_BIND_ADDRESS"],
        ),
        Entry::new("server.port", config.server.port, &["PALAVER_SERVER_PORT"]),
        Entry::new(
            "server.allowed_origins",
            config.server.allowed_origins.join(","),
            &["PALAVER_SERVER_ALLOWED_ORIGINS"],
        ),
        Entry::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs,
            &["PALAVER_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Entry::new(
            "logging.level",
            &config.logging.level,
            &["PALAVER_LOGGING_LEVEL", "PALAVER_LOG_LEVEL"],
        ),
        Entry::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["PALAVER_LOGGING_FORMAT", "PALAVER_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["palaver.toml", "config/palaver.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
