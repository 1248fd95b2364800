//! Sync failure classification and retry logic
//!
//! Failures of a sync attempt are categorized so the controller can report
//! them and the retry loop knows which ones are worth another attempt.

use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,

    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    /// Single attempt, failures are reported as-is
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay.as_secs_f64()),
        )
    }
}

/// Retry settings as they appear in the config file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::no_retry();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            backoff_multiplier: settings.backoff_multiplier.max(1.0),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Categorized failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Connection refused, DNS, reset (retryable)
    Network,

    /// Request did not complete in time (retryable)
    Timeout,

    /// Server answered with a non-success status
    Status,

    /// Response body could not be read as text
    Decode,

    /// Bad endpoint or settings
    Configuration,

    /// Anything else
    Unknown,
}

impl FailureCategory {
    /// Check if this failure category is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureCategory::Network | FailureCategory::Timeout)
    }

    /// Categorize a reqwest error
    pub fn of_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            FailureCategory::Timeout
        } else if error.is_connect() || error.is_request() {
            FailureCategory::Network
        } else if error.is_status() {
            FailureCategory::Status
        } else if error.is_decode() || error.is_body() {
            FailureCategory::Decode
        } else if error.is_builder() {
            FailureCategory::Configuration
        } else {
            FailureCategory::Unknown
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::Network => "network",
            FailureCategory::Timeout => "timeout",
            FailureCategory::Status => "status",
            FailureCategory::Decode => "decode",
            FailureCategory::Configuration => "configuration",
            FailureCategory::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A failed sync attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub category: FailureCategory,
    pub message: String,
}

impl SyncFailure {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    /// Non-success HTTP status, keeping a short excerpt of the body
    pub fn status(status: StatusCode, body: &str) -> Self {
        const EXCERPT: usize = 200;
        let excerpt: String = body.trim().chars().take(EXCERPT).collect();
        let message = if excerpt.is_empty() {
            format!("server answered {}", status)
        } else {
            format!("server answered {}: {}", status, excerpt)
        };
        Self::new(FailureCategory::Status, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    /// Multi-line description with hints, used by the CLI
    pub fn display(&self) -> String {
        let mut output = format!("sync failed ({}): {}\n", self.category, self.message);
        for hint in suggestions(self.category) {
            output.push_str(&format!("   • {}\n", hint));
        }
        output
    }
}

impl From<reqwest::Error> for SyncFailure {
    fn from(error: reqwest::Error) -> Self {
        let category = FailureCategory::of_reqwest(&error);
        Self::new(category, error.to_string())
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.category, self.message)
    }
}

impl std::error::Error for SyncFailure {}

fn suggestions(category: FailureCategory) -> &'static [&'static str] {
    match category {
        FailureCategory::Network => &[
            "Check that the jute server is running",
            "Verify the endpoint URL",
        ],
        FailureCategory::Timeout => &["Increase request_timeout_secs in jute-sync.toml"],
        FailureCategory::Status => &["The server rejected the definition or document; see the message above"],
        FailureCategory::Decode => &["The server response was not valid text"],
        FailureCategory::Configuration => &["Review jute-sync.toml and JUTE_SYNC_* variables"],
        FailureCategory::Unknown => &["Run with RUST_LOG=jute_sync=debug for details"],
    }
}

/// Run an async operation, retrying retryable failures per `policy`
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T, SyncFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncFailure>>,
{
    let mut attempts = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(failure) => {
                if attempts >= policy.max_attempts || !failure.is_retryable() {
                    return Err(failure);
                }

                tracing::warn!(
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    error = %failure,
                    "sync attempt failed, retrying in {:?}",
                    delay
                );

                sleep(delay).await;
                delay = policy.next_delay(delay);
            }
        }
    }
}
