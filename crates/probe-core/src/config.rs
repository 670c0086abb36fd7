use crate::backoff::BackoffPolicy;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_FROM_ADDR: &str = "FROM_ADDR";
pub const GMAIL_SEND_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub log_path: PathBuf,
    pub token_path: PathBuf,
    pub batch_size: usize,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_secs: u64,
    pub credential_refresh_secs: u64,
    pub send_endpoint: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("send_log.csv"),
            token_path: PathBuf::from("token.json"),
            batch_size: 5,
            base_delay_ms: 200,
            backoff_factor: 1.5,
            max_delay_secs: 60,
            credential_refresh_secs: 600,
            send_endpoint: GMAIL_SEND_ENDPOINT.to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&data).context("parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 1.0) {
            return Err(ConfigError::Invalid {
                name: "backoff_factor",
                reason: format!("must be >= 1.0, got {}", self.backoff_factor),
            });
        }
        Ok(())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(self.base_delay_ms),
            factor: self.backoff_factor,
            max: Duration::from_secs(self.max_delay_secs),
        }
    }

    pub fn credential_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.credential_refresh_secs)
    }
}

pub fn from_addr_from_env() -> Result<String, ConfigError> {
    from_addr_from(std::env::var(ENV_FROM_ADDR).ok())
}

fn from_addr_from(value: Option<String>) -> Result<String, ConfigError> {
    match value.map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv(ENV_FROM_ADDR)),
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let project =
        ProjectDirs::from("com", "mail-probe", "mail-probe").context("resolve project dirs")?;
    Ok(project.config_dir().join("config.json"))
}

pub fn lock_path_for(log_path: &Path) -> PathBuf {
    let mut name = log_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
