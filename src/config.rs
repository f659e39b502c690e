use chrono::{FixedOffset, Offset, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::session::SESSION_DURATION;

// Constants
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings of the web front end
///
/// Read from `IMC_*` environment variables:
/// * `IMC_API_URL` - base URL of the calculation/history backend (required)
/// * `IMC_AUTH_URL` - base URL of the identity provider (required)
/// * `IMC_AUTH_API_KEY` - project key sent to the identity provider (optional)
/// * `IMC_BIND_ADDR` - listen address, default `127.0.0.1:3000`
/// * `IMC_UTC_OFFSET_MINUTES` - reference zone for date filters, default 0
/// * `IMC_SESSION_HOURS` - session lifetime, default 24
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_url: String,
    pub auth_url: String,
    pub auth_api_key: Option<String>,
    pub bind_addr: String,
    pub reference_offset: FixedOffset,
    pub session_lifetime: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_url = non_empty("IMC_API_URL").ok_or(ConfigError::Missing("IMC_API_URL"))?;
        let auth_url = non_empty("IMC_AUTH_URL").ok_or(ConfigError::Missing("IMC_AUTH_URL"))?;

        let reference_offset = match non_empty("IMC_UTC_OFFSET_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .ok()
                .and_then(|minutes| minutes.checked_mul(60))
                .and_then(FixedOffset::east_opt)
                .ok_or(ConfigError::Invalid {
                    name: "IMC_UTC_OFFSET_MINUTES",
                    value: raw,
                })?,
            None => Utc.fix(),
        };

        let session_lifetime = match non_empty("IMC_SESSION_HOURS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|hours| *hours > 0)
                .map(|hours| Duration::from_secs(hours * 60 * 60))
                .ok_or(ConfigError::Invalid {
                    name: "IMC_SESSION_HOURS",
                    value: raw,
                })?,
            None => Duration::from_secs(SESSION_DURATION),
        };

        Ok(Self {
            api_url: trim_base_url(&api_url),
            auth_url: trim_base_url(&auth_url),
            auth_api_key: non_empty("IMC_AUTH_API_KEY"),
            bind_addr: non_empty("IMC_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            reference_offset,
            session_lifetime,
        })
    }
}

/// Base URLs are joined with `/path`, so trailing slashes are dropped
fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = AppConfig::from_lookup(lookup(&[
            ("IMC_API_URL", "https://api.example.com///"),
            ("IMC_AUTH_URL", "https://auth.example.com/auth/v1/"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.auth_url, "https://auth.example.com/auth/v1");
        assert_eq!(config.auth_api_key, None);
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.reference_offset.local_minus_utc(), 0);
        assert_eq!(config.session_lifetime, Duration::from_secs(SESSION_DURATION));
    }

    #[test]
    fn reads_offset_and_lifetime() {
        let config = AppConfig::from_lookup(lookup(&[
            ("IMC_API_URL", "http://localhost:8080"),
            ("IMC_AUTH_URL", "http://localhost:9999"),
            ("IMC_UTC_OFFSET_MINUTES", "-180"),
            ("IMC_SESSION_HOURS", "2"),
            ("IMC_AUTH_API_KEY", "anon"),
        ]))
        .unwrap();

        assert_eq!(config.reference_offset.local_minus_utc(), -3 * 3600);
        assert_eq!(config.session_lifetime, Duration::from_secs(7200));
        assert_eq!(config.auth_api_key.as_deref(), Some("anon"));
    }

    #[test]
    fn rejects_missing_and_invalid_values() {
        assert_eq!(
            AppConfig::from_lookup(lookup(&[("IMC_AUTH_URL", "http://a")])),
            Err(ConfigError::Missing("IMC_API_URL"))
        );
        assert_eq!(
            AppConfig::from_lookup(lookup(&[
                ("IMC_API_URL", "http://a"),
                ("IMC_AUTH_URL", "http://b"),
                ("IMC_UTC_OFFSET_MINUTES", "east"),
            ])),
            Err(ConfigError::Invalid {
                name: "IMC_UTC_OFFSET_MINUTES",
                value: "east".to_string()
            })
        );
    }
}
