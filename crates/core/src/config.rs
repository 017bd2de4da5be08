use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Ceiling on the cumulative estimated tokens of one conversation.
    pub max_tokens_per_conversation: i64,
    /// Hold a per-conversation lock from the budget check until commit.
    pub serialize_turns: bool,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub token_ttl_minutes: u64,
    pub cookie_secure: bool,
    pub bcrypt_cost: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub jwt_secret: Option<String>,
    pub max_tokens_per_conversation: Option<i64>,
    pub port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://palaver.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                model: "gemini-2.5-flash-lite".to_string(),
                temperature: 0.5,
                max_output_tokens: 2048,
            },
            chat: ChatConfig { max_tokens_per_conversation: 10_000, serialize_turns: true },
            auth: AuthConfig {
                jwt_secret: String::new().into(),
                token_ttl_minutes: 10_080,
                cookie_secure: false,
                bcrypt_cost: 12,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                allowed_origins: vec![
                    "http://localhost:5173".to_string(),
                    "http://localhost:8000".to_string(),
                ],
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("palaver.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                self.llm.max_output_tokens = max_output_tokens;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(max_tokens) = chat.max_tokens_per_conversation {
                self.chat.max_tokens_per_conversation = max_tokens;
            }
            if let Some(serialize_turns) = chat.serialize_turns {
                self.chat.serialize_turns = serialize_turns;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(jwt_secret) = auth.jwt_secret {
                self.auth.jwt_secret = secret_value(jwt_secret);
            }
            if let Some(token_ttl_minutes) = auth.token_ttl_minutes {
                self.auth.token_ttl_minutes = token_ttl_minutes;
            }
            if let Some(cookie_secure) = auth.cookie_secure {
                self.auth.cookie_secure = cookie_secure;
            }
            if let Some(bcrypt_cost) = auth.bcrypt_cost {
                self.auth.bcrypt_cost = bcrypt_cost;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(allowed_origins) = server.allowed_origins {
                self.server.allowed_origins = allowed_origins;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PALAVER_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PALAVER_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("PALAVER_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PALAVER_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("PALAVER_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let api_key = read_env("PALAVER_LLM_API_KEY").or_else(|| read_env("GOOGLE_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("PALAVER_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("PALAVER_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("PALAVER_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("PALAVER_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("PALAVER_LLM_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = parse_u32("PALAVER_LLM_MAX_OUTPUT_TOKENS", &value)?;
        }

        if let Some(value) = read_env("PALAVER_CHAT_MAX_TOKENS_PER_CONVERSATION") {
            self.chat.max_tokens_per_conversation =
                parse_i64("PALAVER_CHAT_MAX_TOKENS_PER_CONVERSATION", &value)?;
        }
        if let Some(value) = read_env("PALAVER_CHAT_SERIALIZE_TURNS") {
            self.chat.serialize_turns = parse_bool("PALAVER_CHAT_SERIALIZE_TURNS", &value)?;
        }

        if let Some(value) = read_env("PALAVER_AUTH_JWT_SECRET") {
            self.auth.jwt_secret = secret_value(value);
        }
        if let Some(value) = read_env("PALAVER_AUTH_TOKEN_TTL_MINUTES") {
            self.auth.token_ttl_minutes = parse_u64("PALAVER_AUTH_TOKEN_TTL_MINUTES", &value)?;
        }
        if let Some(value) = read_env("PALAVER_AUTH_COOKIE_SECURE") {
            self.auth.cookie_secure = parse_bool("PALAVER_AUTH_COOKIE_SECURE", &value)?;
        }
        if let Some(value) = read_env("PALAVER_AUTH_BCRYPT_COST") {
            self.auth.bcrypt_cost = parse_u32("PALAVER_AUTH_BCRYPT_COST", &value)?;
        }

        if let Some(value) = read_env("PALAVER_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("PALAVER_SERVER_PORT") {
            self.server.port = parse_u16("PALAVER_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("PALAVER_SERVER_ALLOWED_ORIGINS") {
            self.server.allowed_origins = split_list(&value);
        }
        if let Some(value) = read_env("PALAVER_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("PALAVER_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("PALAVER_LOGGING_LEVEL").or_else(|| read_env("PALAVER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PALAVER_LOGGING_FORMAT").or_else(|| read_env("PALAVER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(jwt_secret) = overrides.jwt_secret {
            self.auth.jwt_secret = secret_value(jwt_secret);
        }
        if let Some(max_tokens) = overrides.max_tokens_per_conversation {
            self.chat.max_tokens_per_conversation = max_tokens;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_chat(&self.chat)?;
        validate_auth(&self.auth)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("palaver.toml"), PathBuf::from("config/palaver.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || !matches!(chars.peek(), Some('{')) {
            output.push(ch);
            continue;
        }

        chars.next();
        let mut key = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(next) => key.push(next),
                None => return Err(ConfigError::UnterminatedInterpolation),
            }
        }

        let value =
            env::var(&key).map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
        output.push_str(&value);
    }

    Ok(output)
}

fn validation(message: &str) -> ConfigError {
    ConfigError::Validation(message.to_string())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
        ));
    }
    if database.max_connections == 0 {
        return Err(validation("database.max_connections must be greater than zero"));
    }
    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(validation("database.timeout_secs must be in range 1..=300"));
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    let missing_key =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing_key {
        return Err(validation(
            "llm.api_key is required (set PALAVER_LLM_API_KEY or GOOGLE_API_KEY)",
        ));
    }
    if !is_http_url(&llm.base_url) {
        return Err(validation("llm.base_url must start with http:// or https://"));
    }
    if llm.model.trim().is_empty() {
        return Err(validation("llm.model must not be empty"));
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(validation("llm.temperature must be in range 0.0..=2.0"));
    }
    if llm.max_output_tokens == 0 {
        return Err(validation("llm.max_output_tokens must be greater than zero"));
    }
    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.max_tokens_per_conversation <= 0 {
        return Err(validation("chat.max_tokens_per_conversation must be greater than zero"));
    }
    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    if auth.jwt_secret.expose_secret().trim().is_empty() {
        return Err(validation("auth.jwt_secret is required (set PALAVER_AUTH_JWT_SECRET)"));
    }
    if auth.token_ttl_minutes == 0 {
        return Err(validation("auth.token_ttl_minutes must be greater than zero"));
    }
    if !(4..=31).contains(&auth.bcrypt_cost) {
        return Err(validation("auth.bcrypt_cost must be in range 4..=31"));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(validation("server.port must be greater than zero"));
    }
    if server.graceful_shutdown_secs == 0 {
        return Err(validation("server.graceful_shutdown_secs must be greater than zero"));
    }
    if let Some(origin) = server.allowed_origins.iter().find(|origin| !is_http_url(origin)) {
        return Err(ConfigError::Validation(format!(
            "server.allowed_origins entry `{origin}` must start with http:// or https://"
        )));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validation("logging.level must be one of trace|debug|info|warn|error")),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    parse_env(key, value)
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    parse_env(key, value)
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    parse_env(key, value)
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    parse_env(key, value)
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    parse_env(key, value)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_env(key, value)
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    chat: Option<ChatPatch>,
    auth: Option<AuthPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    max_tokens_per_conversation: Option<i64>,
    serialize_turns: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    jwt_secret: Option<String>,
    token_ttl_minutes: Option<u64>,
    cookie_secure: Option<bool>,
    bcrypt_cost: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const REQUIRED: [(&str, &str); 2] =
        [("PALAVER_LLM_API_KEY", "test-gemini-key"), ("PALAVER_AUTH_JWT_SECRET", "test-jwt-secret")];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required() {
        for (key, value) in REQUIRED {
            env::set_var(key, value);
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
        for (key, _) in REQUIRED {
            env::remove_var(key);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_chat_service_expectations() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        set_required();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.chat.max_tokens_per_conversation == 10_000, "default ceiling is 10000")?;
            ensure(config.chat.serialize_turns, "turns are serialized by default")?;
            ensure(config.llm.model == "gemini-2.5-flash-lite", "default model")?;
            ensure(config.llm.max_output_tokens == 2048, "default max output tokens")?;
            ensure(config.auth.token_ttl_minutes == 10_080, "default session lifetime is 7 days")?;
            ensure(!config.auth.cookie_secure, "cookies are not secure-only by default")?;
            ensure(config.server.allowed_origins.len() == 2, "two default cors origins")?;
            ensure(matches!(config.logging.format, LogFormat::Compact), "compact logs by default")
        })();

        clear_vars(&[]);
        result
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PALAVER_GEMINI_KEY", "key-from-env");
        env::set_var("TEST_PALAVER_JWT", "jwt-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("palaver.toml");
            fs::write(
                &path,
                r#"
[llm]
api_key = "${TEST_PALAVER_GEMINI_KEY}"

[auth]
jwt_secret = "${TEST_PALAVER_JWT}"

[chat]
max_tokens_per_conversation = 500
serialize_turns = false
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "key-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            ensure(
                config.auth.jwt_secret.expose_secret() == "jwt-from-env",
                "jwt secret should be interpolated from environment",
            )?;
            ensure(config.chat.max_tokens_per_conversation == 500, "ceiling read from file")?;
            ensure(!config.chat.serialize_turns, "serialize_turns read from file")
        })();

        clear_vars(&["TEST_PALAVER_GEMINI_KEY", "TEST_PALAVER_JWT"]);
        result
    }

    #[test]
    fn google_api_key_and_logging_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("GOOGLE_API_KEY", "google-key");
        env::set_var("PALAVER_AUTH_JWT_SECRET", "jwt");
        env::set_var("PALAVER_LOG_LEVEL", "warn");
        env::set_var("PALAVER_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "google-key")
                    == Some(true),
                "GOOGLE_API_KEY should populate llm.api_key",
            )?;
            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["GOOGLE_API_KEY", "PALAVER_LOG_LEVEL", "PALAVER_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required();
        env::set_var("PALAVER_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("PALAVER_SERVER_ALLOWED_ORIGINS", "http://a.test, https://b.test");
        env::set_var("PALAVER_CHAT_MAX_TOKENS_PER_CONVERSATION", "2500");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("palaver.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[chat]
max_tokens_per_conversation = 1000

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.chat.max_tokens_per_conversation == 2500,
                "env ceiling should win over file",
            )?;
            ensure(
                config.server.allowed_origins == vec!["http://a.test", "https://b.test"],
                "comma separated origins should be split and trimmed",
            )
        })();

        clear_vars(&[
            "PALAVER_DATABASE_URL",
            "PALAVER_SERVER_ALLOWED_ORIGINS",
            "PALAVER_CHAT_MAX_TOKENS_PER_CONVERSATION",
        ]);
        result
    }

    #[test]
    fn missing_api_key_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PALAVER_AUTH_JWT_SECRET", "jwt");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("llm.api_key")
            );
            ensure(has_message, "validation failure should mention llm.api_key")
        })();

        clear_vars(&["PALAVER_AUTH_JWT_SECRET"]);
        result
    }

    #[test]
    fn invalid_numeric_override_names_the_variable() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required();
        env::set_var("PALAVER_CHAT_MAX_TOKENS_PER_CONVERSATION", "lots");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected invalid override".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "PALAVER_CHAT_MAX_TOKENS_PER_CONVERSATION"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["PALAVER_CHAT_MAX_TOKENS_PER_CONVERSATION"]);
        result
    }

    #[test]
    fn non_positive_ceiling_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        set_required();

        let result = (|| -> Result<(), String> {
            let outcome = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    max_tokens_per_conversation: Some(0),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            });
            ensure(
                matches!(
                    outcome,
                    Err(ConfigError::Validation(ref message))
                        if message.contains("chat.max_tokens_per_conversation")
                ),
                "zero ceiling should be rejected",
            )
        })();

        clear_vars(&[]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PALAVER_LLM_API_KEY", "gemini-secret-value");
        env::set_var("PALAVER_AUTH_JWT_SECRET", "jwt-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("gemini-secret-value"), "debug output should not contain api key")?;
            ensure(!debug.contains("jwt-secret-value"), "debug output should not contain jwt secret")
        })();

        clear_vars(&[]);
        result
    }

    #[test]
    fn required_file_missing_is_reported() {
        let outcome = AppConfig::load(LoadOptions {
            config_path: Some("/nonexistent/palaver.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });

        assert!(matches!(outcome, Err(ConfigError::MissingConfigFile(_))));
    }
}
