use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub chat: ChatConfig,
    pub llm: LlmConfig,
    pub platform: PlatformConfig,
    pub agent: AgentConfig,
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
pub struct ChatConfig {
    pub bot_token: SecretString,
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct PlatformConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub org_id: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub allow_guest_updates: bool,
    pub hydrate_event_details: bool,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
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
    pub chat_bot_token: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub platform_api_key: Option<String>,
    pub platform_org_id: Option<String>,
    pub allow_guest_updates: Option<bool>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://guestline.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            chat: ChatConfig {
                bot_token: String::new().into(),
                api_base: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: String::new().into(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-1.5-flash".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            platform: PlatformConfig {
                api_key: String::new().into(),
                base_url: "https://public-api.lu.ma/public/v1".to_string(),
                org_id: String::new(),
                page_size: 50,
                max_pages: 10,
                timeout_secs: 20,
            },
            agent: AgentConfig { allow_guest_updates: true, hydrate_event_details: false },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("guestline.toml"));
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

        if let Some(chat) = patch.chat {
            if let Some(bot_token_value) = chat.bot_token {
                self.chat.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base) = chat.api_base {
                self.chat.api_base = api_base;
            }
            if let Some(poll_timeout_secs) = chat.poll_timeout_secs {
                self.chat.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = secret_value(llm_api_key_value);
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(platform) = patch.platform {
            if let Some(platform_api_key_value) = platform.api_key {
                self.platform.api_key = secret_value(platform_api_key_value);
            }
            if let Some(base_url) = platform.base_url {
                self.platform.base_url = base_url;
            }
            if let Some(org_id) = platform.org_id {
                self.platform.org_id = org_id;
            }
            if let Some(page_size) = platform.page_size {
                self.platform.page_size = page_size;
            }
            if let Some(max_pages) = platform.max_pages {
                self.platform.max_pages = max_pages;
            }
            if let Some(timeout_secs) = platform.timeout_secs {
                self.platform.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(allow_guest_updates) = agent.allow_guest_updates {
                self.agent.allow_guest_updates = allow_guest_updates;
            }
            if let Some(hydrate_event_details) = agent.hydrate_event_details {
                self.agent.hydrate_event_details = hydrate_event_details;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
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
        if let Some(value) = read_env("GUESTLINE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("GUESTLINE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("GUESTLINE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("GUESTLINE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("GUESTLINE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GUESTLINE_CHAT_BOT_TOKEN") {
            self.chat.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("GUESTLINE_CHAT_API_BASE") {
            self.chat.api_base = value;
        }
        if let Some(value) = read_env("GUESTLINE_CHAT_POLL_TIMEOUT_SECS") {
            self.chat.poll_timeout_secs = parse_u64("GUESTLINE_CHAT_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GUESTLINE_LLM_API_KEY") {
            self.llm.api_key = secret_value(value);
        }
        if let Some(value) = read_env("GUESTLINE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("GUESTLINE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("GUESTLINE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("GUESTLINE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("GUESTLINE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("GUESTLINE_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("GUESTLINE_PLATFORM_API_KEY") {
            self.platform.api_key = secret_value(value);
        }
        if let Some(value) = read_env("GUESTLINE_PLATFORM_BASE_URL") {
            self.platform.base_url = value;
        }
        if let Some(value) = read_env("GUESTLINE_PLATFORM_ORG_ID") {
            self.platform.org_id = value;
        }
        if let Some(value) = read_env("GUESTLINE_PLATFORM_PAGE_SIZE") {
            self.platform.page_size = parse_u32("GUESTLINE_PLATFORM_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("GUESTLINE_PLATFORM_MAX_PAGES") {
            self.platform.max_pages = parse_u32("GUESTLINE_PLATFORM_MAX_PAGES", &value)?;
        }
        if let Some(value) = read_env("GUESTLINE_PLATFORM_TIMEOUT_SECS") {
            self.platform.timeout_secs = parse_u64("GUESTLINE_PLATFORM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GUESTLINE_AGENT_ALLOW_GUEST_UPDATES") {
            self.agent.allow_guest_updates =
                parse_bool("GUESTLINE_AGENT_ALLOW_GUEST_UPDATES", &value)?;
        }
        if let Some(value) = read_env("GUESTLINE_AGENT_HYDRATE_EVENT_DETAILS") {
            self.agent.hydrate_event_details =
                parse_bool("GUESTLINE_AGENT_HYDRATE_EVENT_DETAILS", &value)?;
        }

        if let Some(value) = read_env("GUESTLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GUESTLINE_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("GUESTLINE_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level =
            read_env("GUESTLINE_LOGGING_LEVEL").or_else(|| read_env("GUESTLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GUESTLINE_LOGGING_FORMAT").or_else(|| read_env("GUESTLINE_LOG_FORMAT"));
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
        if let Some(chat_bot_token) = overrides.chat_bot_token {
            self.chat.bot_token = secret_value(chat_bot_token);
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = secret_value(llm_api_key);
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(platform_api_key) = overrides.platform_api_key {
            self.platform.api_key = secret_value(platform_api_key);
        }
        if let Some(platform_org_id) = overrides.platform_org_id {
            self.platform.org_id = platform_org_id;
        }
        if let Some(allow_guest_updates) = overrides.allow_guest_updates {
            self.agent.allow_guest_updates = allow_guest_updates;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_chat(&self.chat)?;
        validate_llm(&self.llm)?;
        validate_platform(&self.platform)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("guestline.toml"), PathBuf::from("config/guestline.toml")]
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
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    let bot_token = chat.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "chat.bot_token is required. Create a bot with @BotFather and copy the token it returns"
                .to_string(),
        ));
    }
    let well_formed = bot_token
        .split_once(':')
        .map(|(bot_id, secret)| {
            !bot_id.is_empty() && bot_id.bytes().all(|b| b.is_ascii_digit()) && !secret.is_empty()
        })
        .unwrap_or(false);
    if !well_formed {
        return Err(ConfigError::Validation(
            "chat.bot_token must look like `<bot id>:<secret>` as issued by @BotFather".to_string(),
        ));
    }

    validate_http_url("chat.api_base", &chat.api_base)?;

    if chat.poll_timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "chat.poll_timeout_secs must be in range 0..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation("llm.api_key is required".to_string()));
    }
    validate_http_url("llm.base_url", &llm.base_url)?;
    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_platform(platform: &PlatformConfig) -> Result<(), ConfigError> {
    if platform.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "platform.api_key is required to read events and guest lists".to_string(),
        ));
    }
    if platform.org_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "platform.org_id is required for audit attribution".to_string(),
        ));
    }
    validate_http_url("platform.base_url", &platform.base_url)?;
    if platform.page_size == 0 || platform.page_size > 100 {
        return Err(ConfigError::Validation(
            "platform.page_size must be in range 1..=100".to_string(),
        ));
    }
    if platform.max_pages == 0 {
        return Err(ConfigError::Validation(
            "platform.max_pages must be greater than zero".to_string(),
        ));
    }
    if platform.timeout_secs == 0 || platform.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "platform.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    chat: Option<ChatPatch>,
    llm: Option<LlmPatch>,
    platform: Option<PlatformPatch>,
    agent: Option<AgentPatch>,
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
struct ChatPatch {
    bot_token: Option<String>,
    api_base: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct PlatformPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    org_id: Option<String>,
    page_size: Option<u32>,
    max_pages: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    allow_guest_updates: Option<bool>,
    hydrate_event_details: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
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

    const REQUIRED_VARS: &[(&str, &str)] = &[
        ("GUESTLINE_CHAT_BOT_TOKEN", "123456:test-bot-secret"),
        ("GUESTLINE_LLM_API_KEY", "llm-test-key"),
        ("GUESTLINE_PLATFORM_API_KEY", "platform-test-key"),
        ("GUESTLINE_PLATFORM_ORG_ID", "org-test"),
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_vars(vars: &[(&str, &str)]) {
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn clear_required() {
        clear_vars(&REQUIRED_VARS.iter().map(|(key, _)| *key).collect::<Vec<_>>());
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GUESTLINE_BOT_TOKEN", "987654:from-env");
        env::set_var("TEST_GUESTLINE_PLATFORM_KEY", "platform-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("guestline.toml");
            fs::write(
                &path,
                r#"
[chat]
bot_token = "${TEST_GUESTLINE_BOT_TOKEN}"

[llm]
api_key = "llm-from-file"

[platform]
api_key = "${TEST_GUESTLINE_PLATFORM_KEY}"
org_id = "org-file"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.chat.bot_token.expose_secret() == "987654:from-env",
                "bot token should be loaded from environment",
            )?;
            ensure(
                config.platform.api_key.expose_secret() == "platform-from-env",
                "platform key should be loaded from environment",
            )?;
            ensure(config.platform.org_id == "org-file", "org id should come from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_GUESTLINE_BOT_TOKEN", "TEST_GUESTLINE_PLATFORM_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(REQUIRED_VARS);
        env::set_var("GUESTLINE_LOG_LEVEL", "warn");
        env::set_var("GUESTLINE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_required();
        clear_vars(&["GUESTLINE_LOG_LEVEL", "GUESTLINE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(REQUIRED_VARS);
        env::set_var("GUESTLINE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("GUESTLINE_AGENT_ALLOW_GUEST_UPDATES", "false");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("guestline.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[agent]
allow_guest_updates = true
hydrate_event_details = true

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
            ensure(!config.agent.allow_guest_updates, "env should win over file for agent flags")?;
            ensure(config.agent.hydrate_event_details, "file flag should survive env layer")?;
            Ok(())
        })();

        clear_required();
        clear_vars(&["GUESTLINE_DATABASE_URL", "GUESTLINE_AGENT_ALLOW_GUEST_UPDATES"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(REQUIRED_VARS);
        env::set_var("GUESTLINE_CHAT_BOT_TOKEN", "not-a-bot-token");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("chat.bot_token")
            );
            ensure(has_message, "validation failure should mention chat.bot_token")
        })();

        clear_required();
        result
    }

    #[test]
    fn missing_org_id_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(REQUIRED_VARS);
        env::remove_var("GUESTLINE_PLATFORM_ORG_ID");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected validation failure for missing org id".to_string()),
            Err(ConfigError::Validation(message)) if message.contains("platform.org_id") => Ok(()),
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_required();
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_vars(REQUIRED_VARS);

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("test-bot-secret"), "debug output should not contain bot token")?;
            ensure(!debug.contains("llm-test-key"), "debug output should not contain llm key")?;
            ensure(
                !debug.contains("platform-test-key"),
                "debug output should not contain platform key",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_required();
        result
    }
}
