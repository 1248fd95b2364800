//! Runtime configuration
//!
//! Sources, lowest priority first: built-in defaults, `jute-sync.toml`,
//! environment (`.env` is honored), then whatever the CLI overrides.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::{RetryPolicy, RetrySettings};

/// Default config file looked up in the working directory
pub const CONFIG_FILE: &str = "jute-sync.toml";

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/";
const DEFAULT_DEBOUNCE_MS: u64 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How responses of overlapping syncs are applied to the result buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OrderingPolicy {
    /// Apply a response only if no newer request has been applied yet
    #[default]
    LatestRequest,
    /// Apply every response as it arrives; the last one to arrive wins
    LastResponse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// POST target for sync requests
    pub endpoint: Url,

    /// Quiet window before an edit burst triggers a sync
    pub debounce_ms: u64,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    pub ordering: OrderingPolicy,

    pub retry: RetrySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            ordering: OrderingPolicy::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or from `jute-sync.toml` if present, then apply env
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };

        dotenvy::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `JUTE_SYNC_*` overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("JUTE_SYNC_ENDPOINT") {
            self.set_endpoint(&endpoint)?;
        }
        if let Some(ms) = lookup("JUTE_SYNC_DEBOUNCE_MS") {
            self.debounce_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("JUTE_SYNC_DEBOUNCE_MS is not a number: {}", ms))?;
        }
        Ok(())
    }

    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<()> {
        self.endpoint =
            Url::parse(endpoint).with_context(|| format!("invalid endpoint URL: {}", endpoint))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.endpoint.scheme(), "http" | "https") {
            bail!("endpoint must be http or https, got {}", self.endpoint);
        }
        if self.debounce_ms == 0 {
            bail!("debounce_ms must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoint.as_str(), "http://127.0.0.1:3000/");
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.ordering, OrderingPolicy::LatestRequest);
        assert_eq!(config.retry_policy().max_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = Config::from_toml(
            r#"
            endpoint = "http://localhost:8080/jute"
            ordering = "last-response"

            [retry]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint.path(), "/jute");
        assert_eq!(config.ordering, OrderingPolicy::LastResponse);
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay_ms, 100);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_toml("debounce_ms = 0").is_err());
        assert!(Config::from_toml("endpoint = \"ftp://example.com/\"").is_err());
        assert!(Config::from_toml("endpoint = \"not a url\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("JUTE_SYNC_ENDPOINT", "https://jute.example.com/"),
            ("JUTE_SYNC_DEBOUNCE_MS", "150"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.endpoint.host_str(), Some("jute.example.com"));
        assert_eq!(config.debounce_ms, 150);

        let mut config = Config::default();
        assert!(config
            .apply_env(|key| (key == "JUTE_SYNC_DEBOUNCE_MS").then(|| "soon".to_string()))
            .is_err());
    }
}
