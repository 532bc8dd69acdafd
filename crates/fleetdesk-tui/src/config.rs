//! Application configuration.
//!
//! Stored at `~/.config/fleetdesk/config.json`; every field has a default so
//! a missing or partial file is fine. A few environment variables (also read
//! from `.env`) override the file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use fleetdesk_core::api::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use fleetdesk_core::auth::token_store::DEFAULT_SESSION_MAX_AGE_HOURS;
use fleetdesk_core::auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
use fleetdesk_core::cache::refresh::DEFAULT_REFRESH_INTERVAL;

/// Application name used for config/cache/data directory paths
const APP_NAME: &str = "fleetdesk";

const CONFIG_FILE: &str = "config.json";

pub const ENV_API_URL: &str = "FLEETDESK_API_URL";
pub const ENV_USERNAME: &str = "FLEETDESK_USERNAME";
pub const ENV_PASSWORD: &str = "FLEETDESK_PASSWORD";

/// Where the session token is kept between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Zero disables periodic refresh.
    pub refresh_interval_secs: u64,
    pub token_storage: TokenStorage,
    pub session_max_age_hours: i64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
            token_storage: TokenStorage::default(),
            session_max_age_hours: DEFAULT_SESSION_MAX_AGE_HOURS,
            last_username: None,
        }
    }
}

impl Config {
    /// Load the file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config: Self = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
    }

    /// Username and password supplied through the environment, if any.
    pub fn env_credentials(lookup: impl Fn(&str) -> Option<String>) -> (Option<String>, Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
        (non_empty(ENV_USERNAME), non_empty(ENV_PASSWORD))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Directory of the persisted UI state files.
    pub fn state_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join("state"))
    }

    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        Ok(match self.token_storage {
            TokenStorage::File => Arc::new(
                FileTokenStore::new(self.cache_dir()?)
                    .with_max_age(chrono::Duration::hours(self.session_max_age_hours.max(1))),
            ),
            TokenStorage::Keyring => Arc::new(KeyringTokenStore::new()),
            TokenStorage::Memory => Arc::new(MemoryTokenStore::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://127.0.0.1:8000");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.token_storage, TokenStorage::File);
        assert_eq!(config.session_max_age_hours, 12);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"token_storage": "keyring", "refresh_interval_secs": 0}"#)
                .unwrap();
        assert_eq!(config.token_storage, TokenStorage::Keyring);
        assert!(config.refresh_interval().is_zero());
        assert_eq!(config.api_base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_env_overrides_url() {
        let mut config = Config::default();
        config.apply_env(env(&[(ENV_API_URL, " https://fleet.example.com/api ")]));
        assert_eq!(config.api_base_url, "https://fleet.example.com/api");

        config.apply_env(env(&[(ENV_API_URL, "")]));
        assert_eq!(config.api_base_url, "https://fleet.example.com/api");
    }

    #[test]
    fn test_env_credentials() {
        let (user, pass) = Config::env_credentials(env(&[(ENV_USERNAME, "admin"), (ENV_PASSWORD, "")]));
        assert_eq!(user.as_deref(), Some("admin"));
        assert_eq!(pass, None);
    }

    #[test]
    fn test_timeout_never_zero() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
