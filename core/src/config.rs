//! Configuration system for Steward
//!
//! Configuration loads from `~/.steward/config.json` with environment
//! variable overrides for secrets, so tokens never need to live on disk.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Discord channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscordConfig {
    /// Whether Discord is enabled
    #[serde(default)]
    pub enabled: bool,
    /// Bot token from the Discord Developer Portal
    #[serde(default)]
    pub token: String,
    /// Allowed user IDs; empty means everyone
    #[serde(default)]
    pub allow_from: Vec<String>,
}

impl DiscordConfig {
    /// Check if a sender is allowed to use the bot
    pub fn is_allowed(&self, user_id: u64) -> bool {
        self.allow_from.is_empty() || self.allow_from.contains(&user_id.to_string())
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key for the provider
    #[serde(default)]
    pub api_key: String,
    /// Custom API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: default_model(),
        }
    }
}

fn default_model() -> String {
    crate::provider::DEFAULT_MODEL.to_string()
}

/// Root configuration for Steward
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Discord configuration
    #[serde(default)]
    pub discord: DiscordConfig,
    /// Provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Config {
    /// Get the provider API key, if configured
    pub fn api_key(&self) -> Option<String> {
        (!self.provider.api_key.is_empty()).then(|| self.provider.api_key.clone())
    }
}

/// Get the default config directory
pub fn get_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".steward")
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}

/// Load configuration from file
pub async fn load_config() -> Result<Config> {
    load_config_from(get_config_path()).await
}

/// Load configuration from an explicit path
pub async fn load_config_from(config_path: PathBuf) -> Result<Config> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound(config_path).into());
    }

    let contents = fs::read_to_string(&config_path).await?;

    let mut config: Config = serde_json::from_str(&contents)
        .map_err(|e| ConfigError::Parse(format!("Failed to parse config JSON: {}", e)))?;

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Environment variables override file values
fn apply_env_overrides(config: &mut Config) {
    if let Ok(token) = std::env::var("STEWARD_DISCORD_TOKEN") {
        config.discord.token = token;
    }
    if let Ok(key) = std::env::var("STEWARD_PROVIDER_API_KEY") {
        config.provider.api_key = key;
    }
    if let Ok(base) = std::env::var("STEWARD_PROVIDER_API_BASE") {
        config.provider.api_base = Some(base);
    }
}

/// Save configuration to file
pub async fn save_config(config: &Config) -> Result<()> {
    save_config_to(config, get_config_path()).await
}

/// Save configuration to an explicit path
pub async fn save_config_to(config: &Config, config_path: PathBuf) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, json).await?;

    Ok(())
}

/// Create a default configuration
pub fn default_config() -> Config {
    Config::default()
}
