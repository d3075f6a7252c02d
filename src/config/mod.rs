//! Configuration management for registry-composer
//!
//! This module handles loading, parsing, and validating the server
//! configuration from YAML files and environment variables, as well as the
//! per-repository configuration files.

pub mod repo;
pub mod store;

pub use repo::RepoConfig;
pub use store::{ConfigStore, RepositoriesFromStorage};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::storage::StorageConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Repository layout, settings storage, credentials and storage aliases
    #[serde(default)]
    pub meta: MetaConfig,

    /// Outbound HTTP client shared by proxy repositories
    #[serde(default)]
    pub http_client: HttpClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_client.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue(
                "http_client.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "server.max_body_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from environment variables with prefix REGISTRY_COMPOSER_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("REGISTRY_COMPOSER_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("REGISTRY_COMPOSER_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        if let Ok(layout) = std::env::var("REGISTRY_COMPOSER_LAYOUT") {
            config.meta.layout = layout.parse()?;
        }
        if let Ok(path) = std::env::var("REGISTRY_COMPOSER_REPO_CONFIGS") {
            config.meta.storage = StorageConfig::Fs { path: path.into() };
        }

        if let Ok(limit) = std::env::var("REGISTRY_COMPOSER_MAX_BODY_BYTES") {
            config.server.max_body_bytes = limit
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid body size limit".to_string()))?;
        }
        if let Ok(max) = std::env::var("REGISTRY_COMPOSER_HTTP_MAX_CONCURRENT") {
            config.http_client.max_concurrent = max
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid concurrency limit".to_string()))?;
        }

        if let Ok(level) = std::env::var("REGISTRY_COMPOSER_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest request body accepted, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    1 << 30
}

/// Path layout used when several repositories share one namespace
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `/<repo>/...`
    #[default]
    Flat,

    /// `/<org>/<repo>/...`
    Org,
}

impl Layout {
    /// Number of leading path segments naming a repository
    pub fn segments(&self) -> usize {
        match self {
            Layout::Flat => 1,
            Layout::Org => 2,
        }
    }
}

impl std::str::FromStr for Layout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(Layout::Flat),
            "org" => Ok(Layout::Org),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown layout '{}'",
                other
            ))),
        }
    }
}

/// Server-wide repository settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaConfig {
    /// Path layout of the shared namespace
    #[serde(default)]
    pub layout: Layout,

    /// Storage holding `<name>.yaml` repository configurations
    #[serde(default = "default_settings_storage")]
    pub storage: StorageConfig,

    /// Source of user credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Named storages repositories may refer to
    #[serde(default)]
    pub storages: HashMap<String, StorageConfig>,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            storage: default_settings_storage(),
            credentials: CredentialsConfig::default(),
            storages: HashMap::new(),
        }
    }
}

fn default_settings_storage() -> StorageConfig {
    StorageConfig::Fs {
        path: "/var/registry-composer/repo".into(),
    }
}

/// Source of user credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CredentialsConfig {
    /// No users; every request is anonymous
    #[default]
    Anonymous,

    /// YAML file in the settings storage with argon2 password hashes
    File {
        /// Key of the credentials file
        path: String,
    },

    /// A single user from REGISTRY_COMPOSER_USER_NAME / REGISTRY_COMPOSER_USER_PASS
    Env,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpClientConfig {
    /// Maximum number of concurrent upstream requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Whether upstream redirects are followed
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,

    /// Retry policy for idempotent requests
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            follow_redirects: default_follow_redirects(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_max_concurrent() -> usize {
    64
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

fn default_follow_redirects() -> bool {
    true
}

/// Retry configuration for outbound requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Whether to add jitter to backoff
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff() -> u64 {
    200
}

fn default_max_backoff() -> u64 {
    2000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
pub(crate) fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
