use etcetera::{choose_app_strategy, AppStrategy, AppStrategyArgs};
use once_cell::sync::{Lazy, OnceCell};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub static APP_STRATEGY: Lazy<AppStrategyArgs> = Lazy::new(|| AppStrategyArgs {
    top_level_domain: "dev".to_string(),
    author: "mail-agent".to_string(),
    app_name: "mail-agent".to_string(),
});

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration value not found: {0}")]
    NotFound(String),
    #[error("Failed to deserialize value: {0}")]
    DeserializeError(String),
    #[error("Failed to read config file: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Failed to create config directory: {0}")]
    DirectoryError(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::DeserializeError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::DeserializeError(err.to_string())
    }
}

/// Configuration for the mail agent.
///
/// Parameters are looked up in the environment first (the key uppercased),
/// then in `config.yaml`. Secrets follow the same order but fall back to
/// `secrets.yaml`. Both files live in the platform config dir, e.g.
/// `~/.config/mail-agent/` on Linux.
///
/// Environment values are parsed as JSON when possible, so
/// `MAIL_AGENT_MAX_TURNS=10` deserializes as a number and anything that is not
/// valid JSON is taken as a plain string.
///
/// ```no_run
/// use mail_agent::config::Config;
///
/// let config = Config::global();
/// let host: String = config
///     .get_param("OPENAI_HOST")
///     .unwrap_or_else(|_| "https://api.openai.com".to_string());
/// ```
pub struct Config {
    config_path: PathBuf,
    secrets_path: PathBuf,
}

static GLOBAL_CONFIG: OnceCell<Config> = OnceCell::new();

impl Default for Config {
    fn default() -> Self {
        let config_dir = choose_app_strategy(APP_STRATEGY.clone())
            .map(|strategy| strategy.config_dir())
            .unwrap_or_else(|_| PathBuf::from("."));

        Config {
            config_path: config_dir.join("config.yaml"),
            secrets_path: config_dir.join("secrets.yaml"),
        }
    }
}

impl Config {
    /// Get the global configuration instance, initialised from the default paths
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Create a configuration with custom file locations, mostly for tests
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>>(config_path: P1, secrets_path: P2) -> Self {
        Config {
            config_path: config_path.as_ref().to_path_buf(),
            secrets_path: secrets_path.as_ref().to_path_buf(),
        }
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    pub fn path(&self) -> String {
        self.config_path.to_string_lossy().to_string()
    }

    /// Load current values from the config file. A missing file is an empty config.
    pub fn load_values(&self) -> Result<HashMap<String, Value>, ConfigError> {
        load_yaml_map(&self.config_path)
    }

    pub fn load_secrets(&self) -> Result<HashMap<String, Value>, ConfigError> {
        load_yaml_map(&self.secrets_path)
    }

    /// Write every value back to the config file, creating its directory if needed
    pub fn save_values(&self, values: HashMap<String, Value>) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::DirectoryError(e.to_string()))?;
        }
        let yaml = serde_yaml::to_string(&values)?;
        std::fs::write(&self.config_path, yaml)?;
        Ok(())
    }

    /// Get a configuration value (non-secret).
    ///
    /// # Errors
    ///
    /// `NotFound` when neither the environment nor the config file has the key,
    /// `DeserializeError` when the value does not fit `T`.
    pub fn get_param<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<T, ConfigError> {
        if let Some(value) = env_value(key) {
            return Ok(serde_json::from_value(value)?);
        }

        let values = self.load_values()?;
        values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
            .and_then(|v| Ok(serde_json::from_value(v.clone())?))
    }

    pub fn set_param(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let mut values = self.load_values()?;
        values.insert(key.to_string(), value);
        self.save_values(values)
    }

    /// Get a secret value from the environment or `secrets.yaml`
    pub fn get_secret<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<T, ConfigError> {
        if let Some(value) = env_value(key) {
            return Ok(serde_json::from_value(value)?);
        }

        let values = self.load_secrets()?;
        values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
            .and_then(|v| Ok(serde_json::from_value(v.clone())?))
    }
}

fn env_value(key: &str) -> Option<Value> {
    let val = env::var(key.to_uppercase()).ok()?;
    Some(serde_json::from_str(&val).unwrap_or(Value::String(val)))
}

fn load_yaml_map(path: &Path) -> Result<HashMap<String, Value>, ConfigError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let yaml_value: serde_yaml::Value = serde_yaml::from_str(&content)?;
    let json_value: Value = serde_json::to_value(yaml_value)?;
    match json_value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => {
            tracing::warn!("ignoring {}: top level is not a mapping", path.display());
            Ok(HashMap::new())
        }
    }
}
