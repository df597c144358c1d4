use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use tracing::info;
use validator::Validate;

const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_STORAGE_ROOT: &str = "data/files";
const CONFIG_DIR: &str = "config";

/// Settings for the optional AI-assisted extraction backend.
///
/// The backend speaks the OpenAI-compatible chat-completions protocol. When
/// disabled (or unreachable) the extractor falls back to deterministic
/// heuristics; this path is always best-effort.
#[derive(Clone, Debug, Deserialize)]
pub struct AiExtractionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_ai_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

impl Default for AiExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            api_key_env: default_ai_api_key_env(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

impl AiExtractionConfig {
    pub fn disabled() -> Self {
        Self::default()
    }
}

fn default_ai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_ai_api_key_env() -> String {
    "AI_EXTRACTION_API_KEY".to_string()
}
fn default_ai_timeout() -> u64 {
    10
}

/// Settings for the outbound notification relay.
#[derive(Clone, Debug, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub enabled: bool,
    /// HTTP endpoint of the mail relay that performs actual delivery.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_notifier_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            timeout_secs: default_notifier_timeout(),
        }
    }
}

fn default_notifier_timeout() -> u64 {
    5
}

/// Application configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// JWT secret key used to verify bearer tokens
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// JWT expiration time in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON (for log aggregation) instead of human-readable text
    #[serde(default)]
    pub log_json: bool,

    /// Root directory for stored proforma/PO/receipt files
    #[serde(default = "default_storage_root")]
    pub storage_root: String,

    /// Request timeout in seconds applied by the server
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub ai_extraction: AiExtractionConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,
}

fn default_true() -> bool {
    true
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_jwt_expiration() -> u64 {
    3600
}
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_storage_root() -> String {
    DEFAULT_STORAGE_ROOT.to_string()
}
fn default_request_timeout() -> u64 {
    30
}

impl AppConfig {
    /// Minimal constructor used by tests and local tooling.
    pub fn new(database_url: String, jwt_secret: String) -> Self {
        Self {
            database_url,
            auto_migrate: true,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            jwt_secret,
            jwt_expiration: default_jwt_expiration(),
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_json: false,
            storage_root: default_storage_root(),
            request_timeout_secs: default_request_timeout(),
            ai_extraction: AiExtractionConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

/// Loads configuration from layered sources: `config/default`, then
/// `config/{ENVIRONMENT}`, then `APP_*` environment variables.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let cfg = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, environment)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    app_config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    info!(environment = %environment, "Configuration loaded");
    Ok(app_config)
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
