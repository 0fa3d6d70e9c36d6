// ABOUTME: Typed configuration loaded from a TOML file with TEXTCAST_* env overrides.
// ABOUTME: Covers rate caps, delivery/retry tuning, the API endpoint, and logging.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Root configuration. Every field has a default so an empty file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: usize,
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryConfig {
    /// Maximum number of targets processed at the same time.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempt ceiling for transient transport failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff base; doubled after each failed attempt.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,
    /// Wait used when the endpoint answers 429 without a Retry-After header.
    #[serde(default = "default_throttle_fallback_secs")]
    pub throttle_fallback_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_send_path")]
    pub send_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            requests_per_hour: default_requests_per_hour(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            throttle_fallback_secs: default_throttle_fallback_secs(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            send_path: default_send_path(),
            api_key: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_requests_per_minute() -> usize {
    30
}
fn default_requests_per_hour() -> usize {
    500
}
fn default_max_concurrent() -> usize {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_secs() -> f64 {
    1.0
}
fn default_throttle_fallback_secs() -> f64 {
    1.0
}
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_send_path() -> String {
    "/send".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ApiConfig {
    /// Full URL that send requests are posted to.
    pub fn send_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.send_path)
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply environment overrides.
    ///
    /// A path that does not exist yields the defaults rather than an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => Self::from_toml_str(&std::fs::read_to_string(p)?)?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        config.normalize()?;
        Ok(config)
    }

    /// Full URL that send requests are posted to.
    pub fn send_url(&self) -> String {
        self.api.send_url()
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `TEXTCAST_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary lookup, so callers can test without
    /// touching the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "TEXTCAST_REQUESTS_PER_MINUTE")? {
            self.rate_limit.requests_per_minute = v;
        }
        if let Some(v) = parse_var(&lookup, "TEXTCAST_REQUESTS_PER_HOUR")? {
            self.rate_limit.requests_per_hour = v;
        }
        if let Some(v) = parse_var(&lookup, "TEXTCAST_MAX_CONCURRENT")? {
            self.delivery.max_concurrent = v;
        }
        if let Some(v) = parse_var(&lookup, "TEXTCAST_TIMEOUT")? {
            self.delivery.timeout_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "TEXTCAST_MAX_RETRIES")? {
            self.delivery.max_retries = v;
        }
        if let Some(v) = parse_var(&lookup, "TEXTCAST_RETRY_DELAY")? {
            self.delivery.retry_delay_secs = v;
        }
        if let Some(v) = lookup("TEXTCAST_API_URL") {
            self.api.base_url = v;
        }
        if let Some(v) = lookup("TEXTCAST_API_KEY") {
            self.api.api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Some(v) = lookup("TEXTCAST_LOG_LEVEL") {
            self.logging.level = v.to_lowercase();
        }
        Ok(())
    }

    /// Clamp counts to their minimums and reject values that cannot work.
    pub fn normalize(&mut self) -> Result<(), ConfigError> {
        self.rate_limit.requests_per_minute = self.rate_limit.requests_per_minute.max(1);
        self.rate_limit.requests_per_hour = self.rate_limit.requests_per_hour.max(1);
        self.delivery.max_concurrent = self.delivery.max_concurrent.max(1);
        self.delivery.max_retries = self.delivery.max_retries.max(1);

        if !self.delivery.retry_delay_secs.is_finite() || self.delivery.retry_delay_secs < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "retry_delay_secs must be non-negative, got {}",
                self.delivery.retry_delay_secs
            )));
        }
        if !self.delivery.throttle_fallback_secs.is_finite()
            || self.delivery.throttle_fallback_secs < 0.0
        {
            return Err(ConfigError::Invalid(format!(
                "throttle_fallback_secs must be non-negative, got {}",
                self.delivery.throttle_fallback_secs
            )));
        }
        if reqwest::Url::parse(&self.api.base_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "api.base_url is not a valid URL: {}",
                self.api.base_url
            )));
        }
        if !self.api.send_path.starts_with('/') {
            self.api.send_path.insert(0, '/');
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env {
                var: var.to_string(),
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.rate_limit.requests_per_minute, 30);
        assert_eq!(config.rate_limit.requests_per_hour, 500);
        assert_eq!(config.delivery.max_concurrent, 5);
        assert_eq!(config.delivery.max_retries, 3);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [rate_limit]
            requests_per_minute = 10

            [api]
            base_url = "https://gateway.example.com/"
            api_key = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.requests_per_minute, 10);
        assert_eq!(config.rate_limit.requests_per_hour, 500);
        assert_eq!(config.api.api_key.as_deref(), Some("secret"));
        assert_eq!(config.send_url(), "https://gateway.example.com/send");
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup_from(&[
                ("TEXTCAST_REQUESTS_PER_MINUTE", "7"),
                ("TEXTCAST_MAX_CONCURRENT", "2"),
                ("TEXTCAST_RETRY_DELAY", "0.5"),
                ("TEXTCAST_LOG_LEVEL", "DEBUG"),
            ]))
            .unwrap();

        assert_eq!(config.rate_limit.requests_per_minute, 7);
        assert_eq!(config.delivery.max_concurrent, 2);
        assert_eq!(config.delivery.retry_delay_secs, 0.5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(lookup_from(&[("TEXTCAST_MAX_RETRIES", "lots")]))
            .unwrap_err();
        match err {
            ConfigError::Env { var, value } => {
                assert_eq!(var, "TEXTCAST_MAX_RETRIES");
                assert_eq!(value, "lots");
            }
            other => panic!("Expected Env error, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_clamps_zero_caps() {
        let mut config = Config::default();
        config.rate_limit.requests_per_minute = 0;
        config.delivery.max_concurrent = 0;
        config.delivery.max_retries = 0;
        config.api.send_path = "send".to_string();
        config.normalize().unwrap();

        assert_eq!(config.rate_limit.requests_per_minute, 1);
        assert_eq!(config.delivery.max_concurrent, 1);
        assert_eq!(config.delivery.max_retries, 1);
        assert_eq!(config.api.send_path, "/send");
    }

    #[test]
    fn test_normalize_rejects_bad_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();
        assert!(matches!(config.normalize(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.api.send_path, "/send");
    }

    #[test]
    fn test_toml_round_trip_preserves_settings() {
        let mut config = Config::default();
        config.delivery.timeout_secs = 12;
        config.api.api_key = Some("k".to_string());
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }
}
