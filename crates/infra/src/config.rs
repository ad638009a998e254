//! Dispatcher configuration, read from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `REDIS_URL` | `redis://localhost:6379` |
//! | `CONSUMER_GROUP` | `snippetquiz-core` |
//! | `CONSUMER_NAME` | `consumer-<uuid>` |
//! | `POLL_TIMEOUT_MS` | `500` |
//! | `POLL_BATCH_SIZE` | `100` |
//! | `STREAM_PREFIX` | empty |

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_CONSUMER_GROUP: &str = "snippetquiz-core";
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_POLL_BATCH_SIZE: usize = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub redis_url: String,
    pub consumer_group: String,
    pub consumer_name: String,
    pub poll_timeout: Duration,
    pub poll_batch_size: usize,
    pub stream_prefix: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            consumer_group: DEFAULT_CONSUMER_GROUP.to_string(),
            consumer_name: default_consumer_name(),
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            poll_batch_size: DEFAULT_POLL_BATCH_SIZE,
            stream_prefix: String::new(),
        }
    }
}

fn default_consumer_name() -> String {
    format!("consumer-{}", uuid::Uuid::now_v7())
}

impl DispatchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let redis_url = get("REDIS_URL").unwrap_or_else(|| {
            warn!("REDIS_URL not set; using {DEFAULT_REDIS_URL}");
            defaults.redis_url.clone()
        });

        let poll_timeout_ms: u64 = parse_positive(&get, "POLL_TIMEOUT_MS", DEFAULT_POLL_TIMEOUT_MS)?;
        let poll_batch_size: usize =
            parse_positive(&get, "POLL_BATCH_SIZE", DEFAULT_POLL_BATCH_SIZE as u64)? as usize;

        Ok(Self {
            redis_url,
            consumer_group: get("CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            consumer_name: get("CONSUMER_NAME").unwrap_or(defaults.consumer_name),
            poll_timeout: Duration::from_millis(poll_timeout_ms),
            poll_batch_size,
            stream_prefix: lookup("STREAM_PREFIX").unwrap_or_default(),
        })
    }
}

fn parse_positive(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = get(key) else {
        return Ok(default);
    };

    let invalid = |reason: String| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason,
    };

    match raw.trim().parse::<u64>() {
        Ok(0) => Err(invalid("must be greater than zero".to_string())),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<DispatchConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DispatchConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config(&[]).unwrap();

        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.consumer_group, DEFAULT_CONSUMER_GROUP);
        assert!(config.consumer_name.starts_with("consumer-"));
        assert_eq!(config.poll_timeout, Duration::from_millis(500));
        assert_eq!(config.poll_batch_size, 100);
        assert_eq!(config.stream_prefix, "");
    }

    #[test]
    fn values_are_read_from_the_lookup() {
        let config = config(&[
            ("REDIS_URL", "redis://cache:6380"),
            ("CONSUMER_GROUP", "core"),
            ("CONSUMER_NAME", "replica-1"),
            ("POLL_TIMEOUT_MS", "250"),
            ("POLL_BATCH_SIZE", "10"),
            ("STREAM_PREFIX", "snippetquiz:"),
        ])
        .unwrap();

        assert_eq!(config.redis_url, "redis://cache:6380");
        assert_eq!(config.consumer_group, "core");
        assert_eq!(config.consumer_name, "replica-1");
        assert_eq!(config.poll_timeout, Duration::from_millis(250));
        assert_eq!(config.poll_batch_size, 10);
        assert_eq!(config.stream_prefix, "snippetquiz:");
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config(&[("POLL_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "POLL_TIMEOUT_MS", .. }));

        let err = config(&[("POLL_BATCH_SIZE", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "POLL_BATCH_SIZE", .. }));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config(&[("CONSUMER_GROUP", "  ")]).unwrap();
        assert_eq!(config.consumer_group, DEFAULT_CONSUMER_GROUP);
    }
}
