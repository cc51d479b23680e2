//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use aquasense_core::{ClientConfig, PollerConfig};

use crate::cli::ConfigKey;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend root URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Prefix of the `/auth` and `/users` routes, e.g. `/v1`
    #[serde(default)]
    pub account_prefix: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Polling interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Number of points in a history window
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    5
}

fn default_history_limit() -> usize {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            account_prefix: String::new(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            history_limit: default_history_limit(),
            no_color: false,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aquasense")
            .join("config.toml")
    }

    /// Load config from the default location, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`. A missing or unreadable file gives the defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Update one key from its textual value.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        match key {
            ConfigKey::BaseUrl => self.base_url = value.trim().to_string(),
            ConfigKey::AccountPrefix => self.account_prefix = value.trim().to_string(),
            ConfigKey::Timeout => {
                self.timeout = value.trim().parse().context("Timeout must be a number of seconds")?
            }
            ConfigKey::PollInterval => {
                self.poll_interval = value
                    .trim()
                    .parse()
                    .context("Poll interval must be a number of seconds")?
            }
            ConfigKey::HistoryLimit => {
                self.history_limit = value.trim().parse().context("History limit must be a number")?
            }
            ConfigKey::NoColor => {
                self.no_color = match value.trim().to_lowercase().as_str() {
                    "true" | "yes" | "on" | "1" => true,
                    "false" | "no" | "off" | "0" => false,
                    other => bail!("Invalid boolean value '{}'", other),
                }
            }
        }
        Ok(())
    }

    /// Connection settings, with `url` overriding the configured base URL.
    pub fn client_config(&self, url: Option<&str>) -> ClientConfig {
        ClientConfig::new(url.unwrap_or(&self.base_url))
            .account_prefix(self.account_prefix.clone())
            .timeout(Duration::from_secs(self.timeout))
    }

    /// Poller settings, with `interval` (seconds) overriding the configured one.
    pub fn poller_config(&self, interval: Option<u64>) -> PollerConfig {
        PollerConfig::default()
            .interval(Duration::from_secs(interval.unwrap_or(self.poll_interval)))
            .history_limit(self.history_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.client_config(None).validate().is_ok());
        assert!(config.poller_config(None).validate().is_ok());
        assert_eq!(config.poller_config(None).interval, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "base_url = \"http://tank.local:9000\"\npoll_interval = 10\n").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.base_url, "http://tank.local:9000");
        assert_eq!(config.poll_interval, 10);
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.timeout, 10);
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval = \"often\"").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            account_prefix: "/v1".to_string(),
            no_color: true,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_set_keys() {
        let mut config = Config::default();
        config.set(ConfigKey::PollInterval, "15").unwrap();
        config.set(ConfigKey::NoColor, "yes").unwrap();
        config.set(ConfigKey::AccountPrefix, " /api ").unwrap();
        assert_eq!(config.poll_interval, 15);
        assert!(config.no_color);
        assert_eq!(config.account_prefix, "/api");

        assert!(config.set(ConfigKey::Timeout, "soon").is_err());
        assert!(config.set(ConfigKey::NoColor, "maybe").is_err());
    }

    #[test]
    fn test_url_override() {
        let config = Config::default();
        let client = config.client_config(Some("https://remote.example"));
        assert_eq!(client.base_url, "https://remote.example");
        assert_eq!(client.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_interval_override() {
        let config = Config::default();
        assert_eq!(
            config.poller_config(Some(30)).interval,
            Duration::from_secs(30)
        );
    }
}
