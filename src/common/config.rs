//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < environment

use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::DEFAULT_PASSWORD_LENGTH;

const MAX_PASSWORD_LENGTH: usize = 64;
const MAX_SHUTDOWN_GRACE_SECS: u64 = 300;

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "vitshare")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("vitshare.toml"))
}

fn default_receive_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|d| d.download_dir().map(|p| p.join("VitShare")))
        .unwrap_or_else(|| PathBuf::from("received"))
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listening port; 0 asks the OS for an ephemeral port.
    pub port: u16,
    /// Directory uploaded files are stored into.
    pub receive_dir: PathBuf,
    /// Length of the generated share password.
    pub password_length: usize,
    /// How long `stop()` waits for in-flight transfers before force-closing.
    pub shutdown_grace_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 0,
            receive_dir: default_receive_dir(),
            password_length: DEFAULT_PASSWORD_LENGTH,
            shutdown_grace_secs: 5,
        }
    }
}

impl AppConfig {
    /// Merge defaults, the config file (if present), and `VITSHARE_*` env vars.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("VITSHARE_"))
            .extract()
            .context("failed to load configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values instead of silently substituting defaults.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.password_length >= 4 && self.password_length <= MAX_PASSWORD_LENGTH,
            "password_length must be between 4 and {MAX_PASSWORD_LENGTH}, got {}",
            self.password_length
        );
        ensure!(
            self.shutdown_grace_secs <= MAX_SHUTDOWN_GRACE_SECS,
            "shutdown_grace_secs must be at most {MAX_SHUTDOWN_GRACE_SECS}, got {}",
            self.shutdown_grace_secs
        );
        ensure!(
            !self.receive_dir.as_os_str().is_empty(),
            "receive_dir must not be empty"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn rejects_tiny_password_length() {
        let config = AppConfig {
            password_length: 1,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_receive_dir() {
        let config = AppConfig {
            receive_dir: PathBuf::new(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_excessive_grace_period() {
        let config = AppConfig {
            shutdown_grace_secs: 3600,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
