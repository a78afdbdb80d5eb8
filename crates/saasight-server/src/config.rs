//! Configuration for the saasight server
//!
//! Loads configuration from:
//! 1. config.yaml - operational settings (port, database, model, logging)
//! 2. .env file - secrets (API keys)
//!
//! Environment variables always override config.yaml values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use saasight_ask::model::{ModelConfig, DEFAULT_MODEL};
use saasight_duck::seed::SeedOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnvVar { name: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// DuckDB file; created on first start.
    pub path: PathBuf,

    /// Fill an empty database with demo data at startup.
    pub seed_on_start: bool,

    /// Size of the generated demo data.
    pub seed: SeedOptions,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/saasight.duckdb"),
            seed_on_start: true,
            seed: SeedOptions::default(),
        }
    }
}

/// Language model settings. The API key is never read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,

    /// OpenAI-compatible endpoint (Ollama, vLLM, a proxy...)
    pub api_base: Option<String>,

    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: None,
            timeout_secs: 20,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file means defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("SAASIGHT_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SAASIGHT_SERVER_PORT") {
            self.server.port = parse_env("SAASIGHT_SERVER_PORT", &port)?;
        }

        if let Ok(path) = std::env::var("SAASIGHT_DATABASE") {
            self.database.path = PathBuf::from(path);
        }

        if let Ok(model) = std::env::var("SAASIGHT_MODEL") {
            self.llm.model = model;
        }
        if let Ok(base) = std::env::var("SAASIGHT_API_BASE") {
            self.llm.api_base = Some(base).filter(|b| !b.is_empty());
        }
        if let Ok(secs) = std::env::var("SAASIGHT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("SAASIGHT_LLM_TIMEOUT_SECS", &secs)?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }

        Ok(())
    }

    /// Get OpenAI API key from environment (must be in .env)
    pub fn get_openai_api_key() -> Result<String, ConfigError> {
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))
    }

    /// Model settings with the key passed in by the caller.
    pub fn model_config(&self, api_key: Option<String>) -> ModelConfig {
        ModelConfig {
            api_key,
            api_base: self.llm.api_base.clone(),
            model: self.llm.model.clone(),
            timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, PathBuf::from("data/saasight.duckdb"));
        assert!(config.database.seed_on_start);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.timeout_secs, 20);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "stdout");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str(
            r#"
database:
  path: "/tmp/analytics.duckdb"
  seed:
    users: 200
llm:
  model: "llama3.2"
  api_base: "http://localhost:11434/v1"
"#,
        )
        .unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/analytics.duckdb"));
        assert!(config.database.seed_on_start);
        assert_eq!(config.database.seed.users, 200);
        assert_eq!(config.database.seed.revenue_days, 365);
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.llm.api_base.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_model_config_carries_key_explicitly() {
        let mut config = Config::default();
        config.llm.timeout_secs = 3;

        let model = config.model_config(Some("sk-test".to_string()));
        assert_eq!(model.api_key.as_deref(), Some("sk-test"));
        assert_eq!(model.model, "gpt-4o-mini");
        assert_eq!(model.timeout, Duration::from_secs(3));

        assert!(config.model_config(None).api_key.is_none());
    }

    #[test]
    fn test_env_var_override() {
        std::env::set_var("SAASIGHT_SERVER_PORT", "9090");
        std::env::set_var("SAASIGHT_DATABASE", "/tmp/override.duckdb");
        std::env::set_var("SAASIGHT_LLM_TIMEOUT_SECS", "7");

        let config_yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
database:
  path: "data/saasight.duckdb"
  seed_on_start: false
llm:
  model: "gpt-4o-mini"
  timeout_secs: 20
logging:
  level: "info"
  format: "pretty"
  output: "stdout"
  directory: "./logs"
"#;
        let temp_file = std::env::temp_dir().join("saasight_test_config.yaml");
        std::fs::write(&temp_file, config_yaml).unwrap();

        let config = Config::load(&temp_file).unwrap();
        assert_eq!(config.server.port, 9090); // Overridden
        assert_eq!(config.database.path, PathBuf::from("/tmp/override.duckdb"));
        assert!(!config.database.seed_on_start);
        assert_eq!(config.llm.timeout_secs, 7);

        std::env::set_var("SAASIGHT_SERVER_PORT", "not-a-port");
        let err = Config::load(&temp_file).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));

        std::env::remove_var("SAASIGHT_SERVER_PORT");
        std::env::remove_var("SAASIGHT_DATABASE");
        std::env::remove_var("SAASIGHT_LLM_TIMEOUT_SECS");
        std::fs::remove_file(temp_file).ok();
    }
}
