use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::{ClientConfig, Credentials};
use crate::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variables that override the credentials in the config file.
pub const USERNAME_ENV: &str = "JUDGE_USERNAME";
pub const PASSWORD_ENV: &str = "JUDGE_PASSWORD";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub judge: JudgeConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Judge location and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// API root, e.g. `https://judge.example.org/api/`.
    pub base_url: Url,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure: bool,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Delay between polls of the same resource, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Contest to scope submissions, judgings and problems to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_id: Option<i64>,
    /// Where raw responses are archived. Archival is off when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_dir: Option<PathBuf>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            contest_id: None,
            archive_dir: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Replace credentials with `JUDGE_USERNAME` / `JUDGE_PASSWORD` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(username) = std::env::var(USERNAME_ENV) {
            self.judge.username = username;
        }
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            self.judge.password = password;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.settings.poll_interval_secs)
    }

    /// Client settings derived from this config.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.judge.base_url.clone(),
            credentials: Credentials::new(&self.judge.username, &self.judge.password),
            insecure: self.judge.insecure,
            archive_dir: self.settings.archive_dir.clone(),
            request_timeout: Duration::from_secs(self.settings.request_timeout_secs),
        }
    }
}
