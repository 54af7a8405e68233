//! Configuration types for manifest-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Retry behavior for a single task
///
/// Backoff is linear: the sleep after failed attempt `n` is `base_delay * n`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per task, including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay scaled by the attempt number (default: 200 ms)
    #[serde(default = "default_base_delay", with = "duration_millis_serde")]
    pub base_delay: Duration,

    /// Multiply each delay by a random factor in [1, 2) (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            jitter: false,
        }
    }
}

/// HTTP client settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-attempt request timeout (default: 20 seconds)
    #[serde(default = "default_request_timeout", with = "duration_secs_serde")]
    pub request_timeout: Duration,

    /// Idle keep-alive connections kept per host (default: 5)
    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,

    /// Maximum redirects followed per request (default: 10)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            max_idle_per_host: default_max_idle_per_host(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

/// Main configuration for a download run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Manifest files to read (at least one required)
    pub manifests: Vec<PathBuf>,

    /// Directory all destinations are resolved against
    /// (default: "./data/sqhy_data/intent_resize")
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Skip tasks whose destination already exists (default: false)
    #[serde(default)]
    pub skip_existing: bool,

    /// Maximum simultaneously in-flight fetches (default: 50)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retry policy applied to every task
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifests: Vec::new(),
            output_root: default_output_root(),
            skip_existing: false,
            concurrency: default_concurrency(),
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Reject an unusable run configuration
    pub fn validate(&self) -> Result<()> {
        if self.manifests.is_empty() {
            return Err(Error::config(
                "manifests",
                "at least one manifest file is required",
            ));
        }
        self.validate_engine()
    }

    /// Check only the settings the download engine itself depends on
    pub fn validate_engine(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts", "must be at least 1"));
        }
        if self.http.request_timeout.is_zero() {
            return Err(Error::config(
                "http.request_timeout",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn default_output_root() -> PathBuf {
    PathBuf::from("./data/sqhy_data/intent_resize")
}

fn default_concurrency() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_max_idle_per_host() -> usize {
    5
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    concat!("manifest-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

// Duration serialization helpers
mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
