use crate::refresh::{
    DEFAULT_POLL_INTERVAL, DEFAULT_RETRY, DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_DELAY,
    DEFAULT_STALE_AFTER, RefreshPolicy,
};
use crate::source::http::DEFAULT_TIMEOUT;
use crate::view::ViewThresholds;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8000/api/current";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub upstream: Option<UpstreamSection>,
    #[serde(default)]
    pub refresh: Option<RefreshSection>,
    #[serde(default)]
    pub classification: Option<ClassificationSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSection {
    /// `http://` URL of the current-status endpoint
    pub url: Option<String>,
    /// Per-request timeout in seconds (default: 10)
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshSection {
    pub stale_secs: Option<u64>,
    /// Observed as both 45 and 60 in past releases (default: 45)
    pub poll_interval_secs: Option<u64>,
    pub retry: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
    pub refetch_on_focus: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassificationSection {
    pub open_threshold: Option<f64>,
    pub deviation_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_policy().poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "refresh.poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        let thresholds = self.view_thresholds();
        if !thresholds.open_threshold.is_finite() || !thresholds.deviation_threshold.is_finite() {
            return Err(ConfigError::Invalid(
                "classification thresholds must be finite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn upstream_url(&self) -> &str {
        self.upstream
            .as_ref()
            .and_then(|u| u.url.as_deref())
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_UPSTREAM_URL)
    }

    pub fn upstream_timeout(&self) -> Duration {
        self.upstream
            .as_ref()
            .and_then(|u| u.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        let section = self.refresh.as_ref();
        let secs = |pick: fn(&RefreshSection) -> Option<u64>, default: Duration| {
            section
                .and_then(pick)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let millis = |pick: fn(&RefreshSection) -> Option<u64>, default: Duration| {
            section
                .and_then(pick)
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        RefreshPolicy {
            stale_after: secs(|s| s.stale_secs, DEFAULT_STALE_AFTER),
            poll_interval: secs(|s| s.poll_interval_secs, DEFAULT_POLL_INTERVAL),
            retry: section.and_then(|s| s.retry).unwrap_or(DEFAULT_RETRY),
            retry_base_delay: millis(|s| s.retry_base_delay_ms, DEFAULT_RETRY_BASE_DELAY),
            retry_max_delay: millis(|s| s.retry_max_delay_ms, DEFAULT_RETRY_MAX_DELAY),
            refetch_on_focus: section.and_then(|s| s.refetch_on_focus).unwrap_or(true),
        }
    }

    pub fn view_thresholds(&self) -> ViewThresholds {
        let defaults = ViewThresholds::default();
        let section = self.classification.as_ref();
        ViewThresholds {
            open_threshold: section
                .and_then(|c| c.open_threshold)
                .unwrap_or(defaults.open_threshold),
            deviation_threshold: section
                .and_then(|c| c.deviation_threshold)
                .unwrap_or(defaults.deviation_threshold),
        }
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }
}
