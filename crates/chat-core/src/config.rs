use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::config_env::{optional_trimmed, parse_bool, parse_u32, parse_u64};

pub const BASE_URL_ENV: &str = "CLIENT_BASE_URL";
pub const API_KEY_ENV: &str = "CLIENT_API_KEY";
pub const ALLOW_INSECURE_DEV_DEFAULTS_ENV: &str = "CLIENT_ALLOW_INSECURE_DEV_DEFAULTS";

pub const DEV_BASE_URL: &str = "http://localhost:8000";
pub const DEV_API_KEY: &str = "API_KEY";

const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 250;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_POLL_TIMEOUT_MS: u64 = 300_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {key}: {value}")]
    ParseInt { key: String, value: String },
    #[error("invalid boolean in env var {0}")]
    ParseBool(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to build message store http client: {0}")]
    HttpClient(String),
}

/// Connection settings for [`crate::MessageStoreClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub api_key: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_backoff_ms: u64,
    pub poll: PollPolicy,
}

/// How long and how often the conversation loop polls for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingVar(API_KEY_ENV.to_string()));
        }

        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_key,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_backoff_ms: DEFAULT_RETRY_BASE_BACKOFF_MS,
            poll: PollPolicy::default(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let allow_dev_defaults = parse_bool(&lookup, ALLOW_INSECURE_DEV_DEFAULTS_ENV, false)?;
        let base_url = optional_trimmed(&lookup, BASE_URL_ENV);
        let api_key = optional_trimmed(&lookup, API_KEY_ENV);

        let (base_url, api_key) = match (base_url, api_key) {
            (Some(base_url), Some(api_key)) => (base_url, api_key),
            (base_url, api_key) if allow_dev_defaults => {
                warn!(
                    "{BASE_URL_ENV} or {API_KEY_ENV} unset; using insecure development defaults"
                );
                (
                    base_url.unwrap_or_else(|| DEV_BASE_URL.to_string()),
                    api_key.unwrap_or_else(|| DEV_API_KEY.to_string()),
                )
            }
            (None, _) => return Err(ConfigError::MissingVar(BASE_URL_ENV.to_string())),
            (_, None) => return Err(ConfigError::MissingVar(API_KEY_ENV.to_string())),
        };

        let config = Self {
            base_url: parse_base_url(&base_url)?,
            api_key,
            timeout_ms: parse_u64(&lookup, "CLIENT_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            max_retries: parse_u32(&lookup, "CLIENT_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_base_backoff_ms: parse_u64(
                &lookup,
                "CLIENT_RETRY_BASE_BACKOFF_MS",
                DEFAULT_RETRY_BASE_BACKOFF_MS,
            )?,
            poll: PollPolicy {
                interval: Duration::from_millis(parse_u64(
                    &lookup,
                    "CLIENT_POLL_INTERVAL_MS",
                    DEFAULT_POLL_INTERVAL_MS,
                )?),
                timeout: Duration::from_millis(parse_u64(
                    &lookup,
                    "CLIENT_POLL_TIMEOUT_MS",
                    DEFAULT_POLL_TIMEOUT_MS,
                )?),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "CLIENT_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }
        if self.poll.interval.is_zero() {
            return Err(ConfigError::InvalidConfiguration(
                "CLIENT_POLL_INTERVAL_MS must be greater than 0".to_string(),
            ));
        }
        if self.poll.timeout < self.poll.interval {
            return Err(ConfigError::InvalidConfiguration(
                "CLIENT_POLL_TIMEOUT_MS must not be shorter than CLIENT_POLL_INTERVAL_MS"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|err| {
        ConfigError::InvalidConfiguration(format!("{BASE_URL_ENV} is not a valid URL: {err}"))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidConfiguration(format!(
            "{BASE_URL_ENV} must start with http:// or https://"
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{ClientConfig, ConfigError, DEV_API_KEY, DEV_BASE_URL};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn fails_closed_when_base_url_is_missing() {
        let err = ClientConfig::from_lookup(lookup_from(&[("CLIENT_API_KEY", "secret")]))
            .expect_err("missing base url must fail");
        assert!(matches!(err, ConfigError::MissingVar(ref key) if key == "CLIENT_BASE_URL"));
    }

    #[test]
    fn fails_closed_when_api_key_is_blank() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("CLIENT_BASE_URL", "https://chat.example.com"),
            ("CLIENT_API_KEY", "   "),
        ]))
        .expect_err("blank api key must fail");
        assert!(matches!(err, ConfigError::MissingVar(ref key) if key == "CLIENT_API_KEY"));
    }

    #[test]
    fn dev_defaults_require_explicit_opt_in() {
        let config = ClientConfig::from_lookup(lookup_from(&[(
            "CLIENT_ALLOW_INSECURE_DEV_DEFAULTS",
            "true",
        )]))
        .expect("dev defaults should apply");

        assert_eq!(config.base_url.as_str(), format!("{DEV_BASE_URL}/"));
        assert_eq!(config.api_key, DEV_API_KEY);
    }

    #[test]
    fn reads_tuning_values() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CLIENT_BASE_URL", "https://chat.example.com/api/"),
            ("CLIENT_API_KEY", "secret"),
            ("CLIENT_TIMEOUT_MS", "2500"),
            ("CLIENT_MAX_RETRIES", "4"),
            ("CLIENT_POLL_INTERVAL_MS", "200"),
            ("CLIENT_POLL_TIMEOUT_MS", "10000"),
        ]))
        .expect("config should parse");

        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.poll.interval, Duration::from_millis(200));
        assert_eq!(config.poll.timeout, Duration::from_secs(10));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("CLIENT_BASE_URL", "ftp://chat.example.com"),
            ("CLIENT_API_KEY", "secret"),
        ]))
        .expect_err("ftp must be rejected");
        assert!(matches!(err, ConfigError::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("CLIENT_BASE_URL", "https://chat.example.com"),
            ("CLIENT_API_KEY", "secret"),
            ("CLIENT_POLL_INTERVAL_MS", "0"),
        ]))
        .expect_err("zero interval must be rejected");
        assert!(matches!(err, ConfigError::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_malformed_integer() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            ("CLIENT_BASE_URL", "https://chat.example.com"),
            ("CLIENT_API_KEY", "secret"),
            ("CLIENT_MAX_RETRIES", "many"),
        ]))
        .expect_err("non-integer must be rejected");
        assert!(matches!(err, ConfigError::ParseInt { ref key, .. } if key == "CLIENT_MAX_RETRIES"));
    }
}
