//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::Result;
use crate::agent::RateLimiterConfig;
use crate::agent::llm::openai::DEFAULT_BASE_URL;
use crate::error::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory for downloads and scripts
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Account email included in every submission
    #[serde(default)]
    pub email: String,

    /// Shared secret included in every submission
    #[serde(default)]
    pub secret: String,

    /// Primary provider (OpenAI-compatible endpoint)
    #[serde(default)]
    pub primary: PrimaryConfig,

    /// Secondary provider (Gemini), used on primary rate limits
    #[serde(default)]
    pub secondary: Option<SecondaryConfig>,

    /// Maximum agent/tool steps per run
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Wait before retrying a rate-limited secondary
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,

    /// Timeout for HTTP tools and code execution
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Command used to run Python scripts (script path is appended)
    #[serde(default = "default_python_command")]
    pub python_command: Vec<String>,

    /// Command used to install Python packages (package names are appended)
    #[serde(default = "default_install_command")]
    pub install_command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_primary_model")]
    pub model: String,

    #[serde(default = "RateLimiterConfig::primary_default")]
    pub rate_limit: RateLimiterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_secondary_model")]
    pub model: String,

    /// Internal retries on rate limits before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "RateLimiterConfig::secondary_default")]
    pub rate_limit: RateLimiterConfig,
}

impl SecondaryConfig {
    pub fn with_key(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: default_secondary_model(),
            max_retries: default_max_retries(),
            rate_limit: RateLimiterConfig::secondary_default(),
        }
    }
}

fn default_workspace() -> PathBuf {
    config_dir().join("workspace")
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_primary_model() -> String {
    "openai/gpt-5-nano".to_string()
}

fn default_secondary_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_steps() -> usize {
    5000
}

fn default_backoff_secs() -> u64 {
    2
}

fn default_tool_timeout_secs() -> u64 {
    120
}

fn default_python_command() -> Vec<String> {
    vec!["uv".to_string(), "run".to_string()]
}

fn default_install_command() -> Vec<String> {
    vec!["uv".to_string(), "add".to_string()]
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_primary_model(),
            rate_limit: RateLimiterConfig::primary_default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            email: String::new(),
            secret: String::new(),
            primary: PrimaryConfig::default(),
            secondary: None,
            max_steps: default_max_steps(),
            backoff_secs: default_backoff_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            python_command: default_python_command(),
            install_command: default_install_command(),
        }
    }
}

impl Config {
    /// Apply environment overrides. `lookup` is usually `std::env::var(..).ok()`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(*k).filter(|v| !v.is_empty()));

        if let Some(email) = first(&["EMAIL"]) {
            self.email = email;
        }
        if let Some(secret) = first(&["SECRET"]) {
            self.secret = secret;
        }
        if let Some(key) = first(&["AIPIPE_API_KEY", "AI_PIPE_API_KEY"]) {
            self.primary.api_key = key;
        }
        if let Some(url) = first(&["AIPIPE_BASE_URL", "AI_PIPE_BASE_URL"]) {
            self.primary.base_url = url;
        }
        if let Some(key) = first(&["GOOGLE_API_KEY"]) {
            match self.secondary.as_mut() {
                Some(secondary) => secondary.api_key = key,
                None => self.secondary = Some(SecondaryConfig::with_key(&key)),
            }
        }
    }

    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.primary.api_key.is_empty() {
            return Err(Error::Config(
                "Missing primary API key. Set AIPIPE_API_KEY (or AI_PIPE_API_KEY) or primary.api_key.".to_string(),
            ));
        }
        if self.max_steps == 0 {
            return Err(Error::Config("max_steps must be at least 1".to_string()));
        }
        if !self.primary.rate_limit.is_valid() {
            return Err(Error::Config("primary.rate_limit needs positive rate, interval and capacity".to_string()));
        }
        if self.python_command.is_empty() || self.install_command.is_empty() {
            return Err(Error::Config("python_command and install_command cannot be empty".to_string()));
        }
        if let Some(secondary) = &self.secondary {
            if secondary.api_key.is_empty() {
                return Err(Error::Config("secondary.api_key is empty".to_string()));
            }
            if !secondary.rate_limit.is_valid() {
                return Err(Error::Config("secondary.rate_limit needs positive rate, interval and capacity".to_string()));
            }
        }
        Ok(())
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".quizloop")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from `path` (or the default location), then apply
/// environment overrides. A missing default file falls back to defaults;
/// a missing explicit file is an error.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) if !path.exists() => {
            return Err(Error::Config(format!("Config not found at {:?}", path)));
        }
        Some(path) => read(path)?,
        None if config_path().exists() => read(&config_path())?,
        None => Config::default(),
    };

    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

fn read(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Save configuration to file
pub fn save(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.primary.model, "openai/gpt-5-nano");
        assert_eq!(config.primary.base_url, "https://aipipe.org/openrouter/v1");
        assert_eq!(config.max_steps, 5000);
        assert_eq!(config.backoff_secs, 2);
        assert!(config.secondary.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"email": "me@example.com", "max_steps": 40, "secondary": {"api_key": "g"}}"#,
        )
        .unwrap();

        assert_eq!(config.email, "me@example.com");
        assert_eq!(config.max_steps, 40);
        let secondary = config.secondary.unwrap();
        assert_eq!(secondary.model, "gemini-2.0-flash");
        assert_eq!(secondary.max_retries, 5);
        assert_eq!(secondary.rate_limit, RateLimiterConfig::secondary_default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("EMAIL", "me@example.com"),
            ("SECRET", "s3cret"),
            ("AI_PIPE_API_KEY", "fallback-key"),
            ("GOOGLE_API_KEY", "g-key"),
        ]));

        assert_eq!(config.email, "me@example.com");
        assert_eq!(config.secret, "s3cret");
        assert_eq!(config.primary.api_key, "fallback-key");
        assert_eq!(config.secondary.as_ref().map(|s| s.api_key.as_str()), Some("g-key"));
    }

    #[test]
    fn test_preferred_env_name_wins() {
        let mut config = Config::default();
        config.apply_env(env(&[("AIPIPE_API_KEY", "main"), ("AI_PIPE_API_KEY", "alt")]));
        assert_eq!(config.primary.api_key, "main");
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.primary.api_key = "key".to_string();
        assert!(config.validate().is_ok());

        config.max_steps = 0;
        assert!(config.validate().is_err());
        config.max_steps = 10;

        config.secondary = Some(SecondaryConfig::with_key(""));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = Config::default();
        config.email = "me@example.com".to_string();

        save(&config, &path).unwrap();
        let loaded = read(&path).unwrap();

        assert_eq!(loaded.email, "me@example.com");
        assert!(load(Some(&dir.path().join("absent.json"))).is_err());
    }
}
