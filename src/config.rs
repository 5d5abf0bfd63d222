// Configuration load/save

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = ".config/trafficmon";
const CONFIG_FILE: &str = "config.json";

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Seconds a resolved process record stays fresh
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Seconds between full metadata cache clears (0 disables the janitor)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_clear_interval_secs: u64,

    /// Report listening sockets in connection listings
    #[serde(default)]
    pub include_listening: bool,

    /// Preferred connection enumerator backend
    #[serde(default)]
    pub preferred_connection_backend: Option<String>,
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_clear_interval_secs: default_cache_ttl_secs(),
            include_listening: false,
            preferred_connection_backend: None,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        let config_dir = home.join(CONFIG_DIR);

        // Create config directory if it doesn't exist
        fs::create_dir_all(&config_dir).context(format!(
            "Failed to create config directory: {:?}",
            config_dir
        ))?;

        Ok(config_dir.join(CONFIG_FILE))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, falling back to defaults if it is absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        let contents =
            fs::read_to_string(path).context(format!("Failed to read config file: {:?}", path))?;

        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context(format!("Failed to write config file: {:?}", path))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Interval for the cache janitor, `None` when disabled
    pub fn cache_clear_interval(&self) -> Option<Duration> {
        (self.cache_clear_interval_secs > 0)
            .then(|| Duration::from_secs(self.cache_clear_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.cache_clear_interval(), Some(Duration::from_secs(3600)));
        assert!(!config.include_listening);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "include_listening": true, "cache_clear_interval_secs": 0 }"#)
                .unwrap();
        assert!(config.include_listening);
        assert_eq!(config.cache_ttl_secs, 3600);
        assert_eq!(config.cache_clear_interval(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        let config = Config {
            cache_ttl_secs: 120,
            preferred_connection_backend: Some("lsof".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
