//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the backend base URL, the last used username, whether to remember the
//! password in the keychain, and the session monitor timings.
//!
//! Configuration is stored at `~/.config/bankdash/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "bankdash";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when neither config nor environment name one
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_username: Option<String>,
    pub remember_credentials: bool,
    /// Inactivity budget override, in minutes
    pub inactivity_minutes: Option<u64>,
    /// Expiry poll interval override, in seconds
    pub poll_interval_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding local storage, cookies and logs
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Base URL with any trailing slash removed
    pub fn api_base_url(&self) -> String {
        self.api_base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim()
            .trim_end_matches('/')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_url_defaults_and_trims() {
        let mut config = Config::default();
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);

        config.api_base_url = Some("https://bank.example.com/api/".to_string());
        assert_eq!(config.api_base_url(), "https://bank.example.com/api");

        config.api_base_url = Some("   ".to_string());
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bankdash").join(CONFIG_FILE);

        let config = Config {
            api_base_url: Some("https://bank.example.com/api".to_string()),
            last_username: Some("ada@example.com".to_string()),
            remember_credentials: true,
            inactivity_minutes: Some(15),
            poll_interval_secs: None,
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.last_username.as_deref(), Some("ada@example.com"));
        assert!(loaded.remember_credentials);
        assert_eq!(loaded.inactivity_minutes, Some(15));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"last_username": "ada"}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.last_username.as_deref(), Some("ada"));
        assert!(!loaded.remember_credentials);
        assert_eq!(loaded.inactivity_minutes, None);
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.api_base_url.is_none());
    }
}
