use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::{Error, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub url: String,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Supabase,
    S3,
    Local,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    /// Supabase project URL, S3 endpoint, or root directory for `local`.
    #[serde(default)]
    pub url: String,
    /// Supabase service key, or the S3 secret key.
    #[serde(default)]
    pub key: String,
    pub bucket: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// S3 access key id. Unused by the other backends.
    #[serde(default)]
    pub access_key: String,
    #[serde(default = "default_uri_scheme")]
    pub uri_scheme: String,
    #[serde(default = "default_source_name")]
    pub source_name: String,
    #[serde(default = "default_local_dir")]
    pub local_dir: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub statement_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_api_timeout_secs() -> u64 {
    30
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Supabase
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_uri_scheme() -> String {
    "supabase".to_string()
}

fn default_source_name() -> String {
    "products".to_string()
}

fn default_local_dir() -> String {
    "data/raw".to_string()
}

fn default_table() -> String {
    "products_staging".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The keys an external secret store must provide to run the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ApiUrl,
    StorageUrl,
    StorageKey,
    Bucket,
    DbUrl,
}

impl ConfigKey {
    pub const REQUIRED: [ConfigKey; 5] = [
        ConfigKey::ApiUrl,
        ConfigKey::StorageUrl,
        ConfigKey::StorageKey,
        ConfigKey::Bucket,
        ConfigKey::DbUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::ApiUrl => "API_URL",
            ConfigKey::StorageUrl => "STORAGE_URL",
            ConfigKey::StorageKey => "STORAGE_KEY",
            ConfigKey::Bucket => "BUCKET",
            ConfigKey::DbUrl => "DB_URL",
        }
    }

    /// Dotted path of the setting this key populates.
    fn settings_path(&self) -> &'static str {
        match self {
            ConfigKey::ApiUrl => "api.url",
            ConfigKey::StorageUrl => "storage.url",
            ConfigKey::StorageKey => "storage.key",
            ConfigKey::Bucket => "storage.bucket",
            ConfigKey::DbUrl => "database.url",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key/value lookup for externally supplied variables and secrets.
pub trait ConfigProvider {
    fn get(&self, key: ConfigKey) -> Option<String>;

    fn require(&self, key: ConfigKey) -> Result<String> {
        self.get(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| Error::MissingConfig(key.to_string()))
    }
}

/// Reads the required keys from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvProvider;

impl ConfigProvider for EnvProvider {
    fn get(&self, key: ConfigKey) -> Option<String> {
        std::env::var(key.as_str()).ok()
    }
}

impl ConfigProvider for HashMap<String, String> {
    fn get(&self, key: ConfigKey) -> Option<String> {
        HashMap::get(self, key.as_str()).cloned()
    }
}

impl Settings {
    /// Loads a config file and applies `APP_` prefixed environment overrides,
    /// e.g. `APP_DATABASE__URL`.
    pub fn new(path: &str) -> Result<Self> {
        Self::load(path, None)
    }

    /// `env` replaces the process environment as the override source when given.
    fn load(path: &str, env: Option<HashMap<String, String>>) -> Result<Self> {
        let environment = Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .source(env);

        let builder = Config::builder()
            .add_source(File::with_name(path))
            .add_source(environment);

        let config = builder.build()?;

        if let Ok(headers) = config.get_table("api.headers") {
            debug!(?headers, "Loaded API headers from configuration");
        }

        let settings: Settings = config.try_deserialize()?;
        debug!(
            backend = ?settings.storage.backend,
            bucket = %settings.storage.bucket,
            table = %settings.database.table,
            "Parsed settings"
        );

        Ok(settings)
    }

    /// Builds settings from the enumerated keys of a [`ConfigProvider`],
    /// leaving every other setting at its default.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self> {
        let mut builder = Config::builder();
        for key in ConfigKey::REQUIRED {
            builder = builder.set_override(key.settings_path(), provider.require(key)?)?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn api_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.api.timeout_secs)
    }
}
