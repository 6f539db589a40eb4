//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Credentials may be supplied (or overridden) through the environment:
//! CHANNEL_SECRET, CHANNEL_ACCESS_TOKEN, SLACK_INCOMING_WEBHOOK_PATH.
//! The environment is read exactly once, at load time.

use crate::infra::error::ConfigError;
use anyhow::Context;
use chrono::FixedOffset;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineConfig {
    /// Channel secret used to verify webhook signatures
    #[serde(default)]
    pub channel_secret: String,
    /// Channel access token for the reply API
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: String::new(),
            access_token: String::new(),
            api_base: default_line_api_base(),
        }
    }
}

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    #[serde(default = "default_slack_base_url")]
    pub base_url: String,
    /// Incoming-webhook path (/services/T000/B000/XXXX)
    #[serde(default)]
    pub webhook_path: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self { base_url: default_slack_base_url(), webhook_path: String::new() }
    }
}

fn default_slack_base_url() -> String {
    "https://hooks.slack.com".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// File path for the attendance log (JSONL format)
    #[serde(default = "default_store_file")]
    pub file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { file: default_store_file() }
    }
}

fn default_store_file() -> String {
    "attendance.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeConfig {
    /// Business timezone as a fixed UTC offset in hours
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self { utc_offset_hours: default_utc_offset_hours() }
    }
}

fn default_utc_offset_hours() -> i32 {
    9 // Asia/Tokyo
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub slack: SlackConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub time: TimeConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    bind_address: String,
    port: u16,
    channel_secret: String,
    access_token: String,
    line_api_base: String,
    slack_base_url: String,
    slack_webhook_path: String,
    store_file: String,
    utc_offset_hours: i32,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            channel_secret: String::new(),
            access_token: String::new(),
            line_api_base: default_line_api_base(),
            slack_base_url: default_slack_base_url(),
            slack_webhook_path: String::new(),
            store_file: default_store_file(),
            utc_offset_hours: default_utc_offset_hours(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            bind_address: toml_config.server.bind_address,
            port: toml_config.server.port,
            channel_secret: toml_config.line.channel_secret,
            access_token: toml_config.line.access_token,
            line_api_base: toml_config.line.api_base,
            slack_base_url: toml_config.slack.base_url,
            slack_webhook_path: toml_config.slack.webhook_path,
            store_file: toml_config.store.file,
            utc_offset_hours: toml_config.time.utc_offset_hours,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries the TOML file first, falls back to
    /// defaults, then overlays credentials from the environment.
    pub fn load_from_path(path: &str) -> Self {
        let mut config = match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    /// Overlay credentials from the environment (read once, at startup)
    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = env::var("CHANNEL_SECRET") {
            self.channel_secret = secret;
        }
        if let Ok(token) = env::var("CHANNEL_ACCESS_TOKEN") {
            self.access_token = token;
        }
        if let Ok(path) = env::var("SLACK_INCOMING_WEBHOOK_PATH") {
            self.slack_webhook_path = path;
        }
    }

    /// Validate that every credential the handlers need is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_secret.is_empty() {
            return Err(ConfigError::MissingCredential("channel_secret"));
        }
        if self.access_token.is_empty() {
            return Err(ConfigError::MissingCredential("access_token"));
        }
        if self.slack_webhook_path.is_empty() {
            return Err(ConfigError::MissingCredential("slack_webhook_path"));
        }
        if FixedOffset::east_opt(self.utc_offset_hours * 3600).is_none() {
            return Err(ConfigError::InvalidOffset(self.utc_offset_hours));
        }
        Ok(())
    }

    /// Business timezone as a chrono offset.
    ///
    /// Falls back to UTC if the configured offset is out of range; `validate`
    /// rejects that case at startup.
    pub fn tz(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }

    // Getters for all config fields
    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn channel_secret(&self) -> &str {
        &self.channel_secret
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn line_api_base(&self) -> &str {
        &self.line_api_base
    }

    pub fn slack_base_url(&self) -> &str {
        &self.slack_base_url
    }

    pub fn slack_webhook_path(&self) -> &str {
        &self.slack_webhook_path
    }

    pub fn store_file(&self) -> &str {
        &self.store_file
    }

    pub fn utc_offset_hours(&self) -> i32 {
        self.utc_offset_hours
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set credentials
    #[cfg(test)]
    pub fn with_credentials(mut self, secret: &str, token: &str, slack_path: &str) -> Self {
        self.channel_secret = secret.to_string();
        self.access_token = token.to_string();
        self.slack_webhook_path = slack_path.to_string();
        self
    }

    /// Builder method for tests to set the store file
    #[cfg(test)]
    pub fn with_store_file(mut self, file: &str) -> Self {
        self.store_file = file.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.line_api_base(), "https://api.line.me");
        assert_eq!(config.slack_base_url(), "https://hooks.slack.com");
        assert_eq!(config.store_file(), "attendance.jsonl");
        assert_eq!(config.utc_offset_hours(), 9);
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCredential("channel_secret"))
        ));

        let config = Config::default().with_credentials("s", "t", "/services/T0/B0/XX");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_offset() {
        let mut config = Config::default().with_credentials("s", "t", "/p");
        config.utc_offset_hours = 99;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidOffset(99))));
    }

    #[test]
    fn test_tz_offset() {
        let config = Config::default();
        assert_eq!(config.tz().local_minus_utc(), 9 * 3600);
    }
}
