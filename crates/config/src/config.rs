//! Configuration files.

use rangefetch_downloader::{PlanConfig, DEFAULT_WORKER_COUNT};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read, parsed or created.
    #[error("failed to load config from {path}: {source}")]
    Load {
        /// Path of the configuration file.
        path: String,
        /// The underlying error.
        #[source]
        source: confy::ConfyError,
    },
}

/// Configuration for the rangefetch binary.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Partitioning of the fetched object.
    pub fetch: FetchConfig,
    /// HTTP client used for remote blob stores.
    pub http: HttpConfig,
    /// Re-running partitions that failed with a retryable error.
    pub retry: RetryConfig,
}

impl Config {
    /// Loads the configuration at `path`.
    ///
    /// If the file does not exist, it is created with the default configuration.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        confy::load_path(path)
            .map_err(|source| ConfigError::Load { path: path.display().to_string(), source })
    }
}

/// Partitioning of the fetched object.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of partitions, each fetched by its own task.
    pub workers: usize,
}

impl FetchConfig {
    /// The planner input this config describes.
    pub const fn plan_config(&self) -> PlanConfig {
        PlanConfig::new(self.workers)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKER_COUNT }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Maximum time to establish a connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Maximum time for a single request, including reading the body of a range.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            // 5min
            request_timeout: Duration::from_secs(5 * 60),
            user_agent: concat!("rangefetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Caller-level retries of partitions that failed with a retryable error.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// How many times failed partitions are re-run. `0` disables retries.
    pub max_retries: usize,
    /// Delay before the first retry.
    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,
    /// Upper bound of the exponentially growing delay.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}
