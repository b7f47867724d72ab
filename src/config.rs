//! Configuration loading and persistence.
//!
//! Handles reading and writing the scenelink configuration file. Both
//! halves of the bridge read the same file: the host extension takes
//! the listen port and asset settings, the client bridge takes the
//! connection target and timeouts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::PathBuf, time::Duration};

use crate::constants::{CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT, RESPONSE_TIMEOUT};

/// Configuration for the scenelink CLI and host extension.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Address the host listens on and the client connects to.
    pub host: String,
    /// TCP port of the bridge socket.
    pub port: u16,
    /// Seconds to wait for one command/response exchange.
    pub response_timeout: u64,
    /// Seconds to wait for the TCP connect.
    pub connect_timeout: u64,
    /// Whether asset catalog commands are registered on activation.
    pub assets_enabled: bool,
    /// Base URL of the asset catalog API.
    pub asset_api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            response_timeout: RESPONSE_TIMEOUT.as_secs(),
            connect_timeout: CONNECT_TIMEOUT.as_secs(),
            assets_enabled: false,
            asset_api_url: "https://api.polyhaven.com".to_string(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `SCENELINK_CONFIG_DIR` env var: explicit override (tests, CI)
    /// 2. Default: platform config dir (e.g. `~/.config/scenelink`)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("SCENELINK_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("scenelink")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| Self::default());
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SCENELINK_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("SCENELINK_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.port = port;
            }
        }
        if let Ok(timeout) = std::env::var("SCENELINK_TIMEOUT") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.response_timeout = timeout;
            }
        }
        if let Ok(assets) = std::env::var("SCENELINK_ASSETS") {
            self.assets_enabled = matches!(assets.as_str(), "1" | "true" | "yes");
        }
        if let Ok(url) = std::env::var("SCENELINK_ASSET_API_URL") {
            self.asset_api_url = url;
        }
    }

    /// Persists the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Exchange deadline as a [`Duration`].
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout)
    }

    /// Connect deadline as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Global lock to prevent env var pollution between tests
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "SCENELINK_HOST",
            "SCENELINK_PORT",
            "SCENELINK_TIMEOUT",
            "SCENELINK_ASSETS",
            "SCENELINK_ASSET_API_URL",
            "SCENELINK_CONFIG_DIR",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9876);
        assert_eq!(config.response_timeout, 15);
        assert!(!config.assets_enabled);
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("SCENELINK_PORT", "7001");
        std::env::set_var("SCENELINK_ASSETS", "1");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.port, 7001);
        assert!(config.assets_enabled);

        clear_env();
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::env::set_var("SCENELINK_CONFIG_DIR", temp_dir.path());

        let mut config = Config::default();
        config.port = 7777;
        config.assets_enabled = true;
        config.save().unwrap();

        let loaded = Config::load().unwrap();
        assert_eq!(loaded.port, 7777);
        assert!(loaded.assets_enabled);

        clear_env();
    }

    #[test]
    fn test_bad_port_env_is_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("SCENELINK_PORT", "not-a-port");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.port, DEFAULT_PORT);

        clear_env();
    }
}
