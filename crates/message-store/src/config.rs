use std::env;
use std::net::SocketAddr;

use chat_core::ConfigError;
use chat_core::config_env::{optional_trimmed, parse_bool};
use tracing::warn;

pub const BIND_ADDR_ENV: &str = "MESSAGE_STORE_BIND_ADDR";
pub const API_KEY_ENV: &str = "MESSAGE_STORE_API_KEY";
pub const ALLOW_INSECURE_DEV_DEFAULTS_ENV: &str = "MESSAGE_STORE_ALLOW_INSECURE_DEV_DEFAULTS";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEV_API_KEY: &str = "API_KEY";

#[derive(Debug, Clone)]
pub struct StoreServerConfig {
    pub bind_addr: SocketAddr,
    pub api_key: String,
}

impl StoreServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_bind_addr = optional_trimmed(&lookup, BIND_ADDR_ENV)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_bind_addr.parse::<SocketAddr>().map_err(|_| {
            ConfigError::InvalidConfiguration(format!(
                "{BIND_ADDR_ENV} must be a socket address, got '{raw_bind_addr}'"
            ))
        })?;

        let api_key = match optional_trimmed(&lookup, API_KEY_ENV) {
            Some(api_key) => api_key,
            None if parse_bool(&lookup, ALLOW_INSECURE_DEV_DEFAULTS_ENV, false)? => {
                warn!("{API_KEY_ENV} unset; accepting the insecure development key");
                DEV_API_KEY.to_string()
            }
            None => return Err(ConfigError::MissingVar(API_KEY_ENV.to_string())),
        };

        Ok(Self { bind_addr, api_key })
    }
}
