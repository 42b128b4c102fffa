//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use thiserror::Error;

/// Secret shipped as the development default. Rejected in production.
pub const DEFAULT_SECRET_KEY: &str = "dev-secret-key-change-in-production";

/// Minimum secret length accepted in production.
const MIN_PRODUCTION_SECRET_LEN: usize = 16;

/// Deployment environment. Selects defaults and validation strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Returns the lowercase name of the environment.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Testing => "testing",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "default" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "testing" | "test" => Ok(Self::Testing),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,

    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Secrets.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Cross-origin settings.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Application identity reported by the API.
    #[serde(default)]
    pub app: AppConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL. `None` selects the environment default.
    #[serde(default)]
    pub url: Option<String>,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Secret material.
#[derive(Clone, Deserialize)]
pub struct SecurityConfig {
    /// Application secret key.
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. `*` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub origins: Vec<String>,
}

/// Application identity.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Display name used in the welcome message.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Version reported by the index route.
    #[serde(default = "default_app_version")]
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "plinth_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_secret_key() -> String {
    DEFAULT_SECRET_KEY.to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:8080".to_string(),
    ]
}

fn default_app_name() -> String {
    "Plinth".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
        }
    }
}

// Keeps the secret out of `info!(?config)` output.
impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Default configuration for an environment.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    /// The effective database URL: the configured one, or the environment default.
    pub fn database_url(&self) -> &str {
        match (&self.database.url, self.environment) {
            (Some(url), _) => url.as_str(),
            (None, Environment::Testing) => "sqlite://:memory:",
            (None, _) => "sqlite:///app.db",
        }
    }

    /// Debug mode is on everywhere except production.
    pub fn debug(&self) -> bool {
        self.environment != Environment::Production
    }

    /// Checks environment-specific requirements.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Production` when production runs without an
    /// explicit database URL or with a weak secret key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment != Environment::Production {
            return Ok(());
        }
        if self.database.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(ConfigError::Production(
                "DATABASE_URL environment variable is required for production".to_string(),
            ));
        }
        let secret = &self.security.secret_key;
        if secret == DEFAULT_SECRET_KEY || secret.len() < MIN_PRODUCTION_SECRET_LEN {
            return Err(ConfigError::Production(
                "SECRET_KEY must be set to a strong secret in production".to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Production requirements are not met.
    #[error("invalid production configuration: {0}")]
    Production(String),
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies process environment overrides and validates the result.
///
/// Environment variable overrides:
/// - `APP_ENV` overrides `environment`
/// - `HOST` / `PORT` override `server.host` / `server.port`
/// - `DATABASE_URL` overrides `database.url`
/// - `DATABASE_BUSY_TIMEOUT_MS` / `DATABASE_POOL_MAX_SIZE` override the pool tunables
/// - `SECRET_KEY` overrides `security.secret_key`
/// - `CORS_ORIGINS` (comma separated) overrides `cors.origins`
/// - `APP_NAME` / `APP_VERSION` override `app.name` / `app.version`
/// - `LOG_LEVEL` overrides `logging.level`
/// - `LOG_JSON` overrides `logging.json` (set to "true" or "1" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the resulting configuration fails [`Config::validate`].
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with overrides read through `lookup` instead of the
/// process environment.
pub fn load_config_with<F>(path: Option<&str>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, lookup);
    config.validate()?;
    Ok(config)
}

/// Applies overrides from `lookup`, which maps a variable name to its value.
///
/// Values that fail to parse are ignored with a warning.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(env) = lookup("APP_ENV") {
        match env.parse() {
            Ok(parsed) => config.environment = parsed,
            Err(e) => tracing::warn!(value = %env, "ignoring APP_ENV: {}", e),
        }
    }
    if let Some(host) = lookup("HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        } else {
            tracing::warn!(value = %host, "ignoring unparsable HOST");
        }
    }
    if let Some(port) = lookup("PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        } else {
            tracing::warn!(value = %port, "ignoring unparsable PORT");
        }
    }
    if let Some(url) = lookup("DATABASE_URL") {
        if !url.trim().is_empty() {
            config.database.url = Some(url);
        }
    }
    if let Some(timeout) = lookup("DATABASE_BUSY_TIMEOUT_MS") {
        if let Ok(parsed) = timeout.parse() {
            config.database.busy_timeout_ms = parsed;
        }
    }
    if let Some(size) = lookup("DATABASE_POOL_MAX_SIZE") {
        if let Ok(parsed) = size.parse() {
            config.database.pool_max_size = parsed;
        }
    }
    if let Some(secret) = lookup("SECRET_KEY") {
        config.security.secret_key = secret;
    }
    if let Some(origins) = lookup("CORS_ORIGINS") {
        config.cors.origins = parse_origins(&origins);
    }
    if let Some(name) = lookup("APP_NAME") {
        config.app.name = name;
    }
    if let Some(version) = lookup("APP_VERSION") {
        config.app.version = version;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}

/// Splits a comma separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
