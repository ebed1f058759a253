//! Configuration management for credshield.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "credshield";

/// Environment variable prefix.
const ENV_PREFIX: &str = "CREDSHIELD_";

/// Longest accepted clipboard timeout (one day).
const MAX_CLIPBOARD_TIMEOUT_SECONDS: u64 = 24 * 60 * 60;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CREDSHIELD_`, `_` read as `-`)
/// 2. TOML config file at `~/.config/credshield/config.toml`
/// 3. Default values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Show username/password notifications and copy to the clipboard.
    pub enable_clipboard_notifications: bool,
    /// Publish record fields to the keyboard bridge.
    pub enable_keyboard_bridge: bool,
    /// Seconds until a copied value is cleared from the clipboard.
    /// Set to 0 to never clear automatically.
    pub clipboard_timeout_seconds: u64,
    /// Switch to the credshield keyboard when the caller asks to close after creating.
    pub auto_open_keyboard_chooser: bool,
    /// Input method id of the credshield keyboard.
    pub keyboard_input_method_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_clipboard_notifications: true,
            enable_keyboard_bridge: true,
            clipboard_timeout_seconds: 60,
            auto_open_keyboard_chooser: false,
            keyboard_input_method_id: "credshield.keyboard".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).map(|key| key.as_str().replace('_', "-").into()));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.clipboard_timeout_seconds > MAX_CLIPBOARD_TIMEOUT_SECONDS {
            return Err(Error::ConfigValidation {
                message: format!(
                    "clipboard-timeout-seconds ({}) cannot exceed {MAX_CLIPBOARD_TIMEOUT_SECONDS}",
                    self.clipboard_timeout_seconds
                ),
            });
        }

        if self.keyboard_input_method_id.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "keyboard-input-method-id must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the clipboard timeout, or `None` if clearing is disabled.
    #[must_use]
    pub fn clipboard_timeout(&self) -> Option<Duration> {
        if self.clipboard_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.clipboard_timeout_seconds))
        }
    }
}
