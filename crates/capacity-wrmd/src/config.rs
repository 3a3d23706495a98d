//! `capacity-sync` configuration.
//!
//! Values resolve in tiers: command-line flags, then `WRMD_*` environment
//! variables, then the TOML file, then built-in defaults. Each resolved
//! credential logs the tier it came from.

use std::path::{Path, PathBuf};
use std::time::Duration;

use capacity_core::source::{Credentials, RetryPolicy};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_BASE_URL: &str = "https://www.wrmd.org/";
pub const ENV_EMAIL: &str = "WRMD_EMAIL";
pub const ENV_PASSWORD: &str = "WRMD_PASSWORD";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing setting: {0}")]
    Missing(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub database: DatabaseConfig,
    pub wrmd: WrmdConfig,
    pub retry: RetryConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("capacity.db"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrmdConfig {
    pub base_url: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for WrmdConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            email: None,
            password: None,
            user_agent: format!("capacity-sync/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for WrmdConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrmdConfig")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl WrmdConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            multiplier: policy.multiplier,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts.max(1),
            Duration::from_millis(self.initial_delay_ms),
            self.multiplier,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Admission years to reconcile; empty means the current year.
    pub years: Vec<u16>,
}

impl ReconcileConfig {
    pub fn years_or_current(&self) -> Vec<u16> {
        if self.years.is_empty() {
            vec![Utc::now().year() as u16]
        } else {
            self.years.clone()
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                info!(path = %path.display(), "Loaded config file");
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Overlay `WRMD_EMAIL` / `WRMD_PASSWORD` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(email) = lookup(ENV_EMAIL).filter(|v| !v.is_empty()) {
            info!("WRMD email from environment");
            self.wrmd.email = Some(email);
        }
        if let Some(password) = lookup(ENV_PASSWORD).filter(|v| !v.is_empty()) {
            info!("WRMD password from environment");
            self.wrmd.password = Some(password);
        }
    }

    /// Overlay values given on the command line.
    pub fn apply_overrides(
        &mut self,
        database: Option<PathBuf>,
        email: Option<String>,
        password: Option<String>,
    ) {
        if let Some(path) = database {
            self.database.path = path;
        }
        if let Some(email) = email {
            info!("WRMD email from command line");
            self.wrmd.email = Some(email);
        }
        if let Some(password) = password {
            info!("WRMD password from command line");
            self.wrmd.password = Some(password);
        }
    }

    pub fn credentials(&self) -> ConfigResult<Credentials> {
        let email = self.wrmd.email.clone().ok_or(ConfigError::Missing("wrmd.email"))?;
        let password = self
            .wrmd
            .password
            .clone()
            .ok_or(ConfigError::Missing("wrmd.password"))?;
        Ok(Credentials::new(email, password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.wrmd.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.retry.policy(), RetryPolicy::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = SyncConfig::from_toml_str(
            r#"
            [wrmd]
            email = "file@example.org"
            password = "from-file"
            "#,
        )
        .unwrap();

        config.apply_env(|key| (key == ENV_EMAIL).then(|| "env@example.org".to_string()));
        let creds = config.credentials().unwrap();
        assert_eq!(creds.email, "env@example.org");
        assert_eq!(creds.password, "from-file");
    }

    #[test]
    fn test_missing_password() {
        let mut config = SyncConfig::default();
        config.apply_overrides(None, Some("a@b.org".into()), None);
        assert!(matches!(
            config.credentials(),
            Err(ConfigError::Missing("wrmd.password"))
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = SyncConfig::default();
        config.wrmd.password = Some("hunter2".into());
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
