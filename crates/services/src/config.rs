use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_COMPLETION_POLL_SECS: u64 = 5 * 60;
pub const DEFAULT_MENTEE_POLL_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// Where the backend lives and how long to wait for it.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ApiConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if `raw` is not an absolute http(s) URL.
    pub fn new(raw: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(raw)?,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        })
    }
}

/// Tick periods for the two background drivers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollingConfig {
    pub completion_interval: Duration,
    pub mentee_check_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            completion_interval: Duration::from_secs(DEFAULT_COMPLETION_POLL_SECS),
            mentee_check_interval: Duration::from_secs(DEFAULT_MENTEE_POLL_SECS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub cache_ttl: chrono::Duration,
}

impl SyncConfig {
    /// Read configuration from `MENTOR_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if `MENTOR_API_URL` is set to
    /// something that is not an http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = env::var("MENTOR_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let mut api = ApiConfig::new(&raw_url)?;
        if let Some(secs) = env_secs("MENTOR_HTTP_TIMEOUT_SECS") {
            api.timeout = Duration::from_secs(secs);
        }

        let defaults = PollingConfig::default();
        let polling = PollingConfig {
            completion_interval: env_secs("MENTOR_COMPLETION_POLL_SECS")
                .map_or(defaults.completion_interval, Duration::from_secs),
            mentee_check_interval: env_secs("MENTOR_MENTEE_POLL_SECS")
                .map_or(defaults.mentee_check_interval, Duration::from_secs),
        };

        let ttl_days = env::var("MENTOR_CACHE_TTL_DAYS")
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|days| *days > 0)
            .unwrap_or(storage::DEFAULT_CACHE_TTL_DAYS);

        Ok(Self {
            api,
            polling,
            cache_ttl: chrono::Duration::days(ttl_days),
        })
    }
}

fn env_secs(name: &str) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|_| ConfigError::InvalidBaseUrl(trimmed.to_owned()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl(trimmed.to_owned()));
    }
    Ok(url)
}
