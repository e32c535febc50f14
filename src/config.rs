//! Configuration types for kegg-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// KEGG's documented per-request entry limit
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// How the first batch of an orchestration call is dispatched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstBatchPolicy {
    /// Fetch the first batch alone; its failure aborts the call (default)
    #[default]
    FailFast,
    /// Fetch every batch concurrently; every failure is recorded per batch
    Concurrent,
}

/// Fetch behavior (endpoint, batching, rate limit, concurrency, timeouts)
///
/// Used as a flattened sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// REST API base URL (default: "https://rest.kegg.jp")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum entries per request (default: 10)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum requests per second across all workers (default: 3)
    #[serde(default = "default_rate_limit_per_second")]
    pub rate_limit_per_second: u32,

    /// Maximum requests in flight (default: 4)
    ///
    /// The rate limit applies regardless of this value; raising it only helps
    /// when responses are slower than the dispatch interval.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// First-batch dispatch policy (default: fail fast)
    #[serde(default)]
    pub first_batch: FirstBatchPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            batch_size: default_batch_size(),
            rate_limit_per_second: default_rate_limit_per_second(),
            max_concurrency: default_max_concurrency(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            first_batch: FirstBatchPolicy::default(),
        }
    }
}

/// Local storage for streamed results
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding result files and metadata (default: "./kegg_data")
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// Name prefix of the metadata file and SQLite database (default: "kegg")
    #[serde(default = "default_db_name")]
    pub db_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            db_name: default_db_name(),
        }
    }
}

impl StorageConfig {
    /// Path of the SQLite database used by [`SqliteStore`](crate::store::SqliteStore)
    pub fn database_path(&self) -> PathBuf {
        self.storage_path.join(format!("{}.db", self.db_name))
    }
}

/// Main configuration for [`KeggClient`](crate::KeggClient)
///
/// Fetch settings are flattened so the serialized form stays flat:
///
/// ```json
/// { "batch_size": 10, "rate_limit_per_second": 3, "storage": { "db_name": "kegg" } }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fetch behavior
    #[serde(flatten)]
    pub fetch: FetchConfig,

    /// Local storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Parse a configuration from JSON, applying defaults for missing keys
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub async fn load(path: &std::path::Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        self.fetch.validate()?;
        if self.storage.db_name.trim().is_empty() {
            return Err(Error::config("db_name must not be empty", "db_name"));
        }
        Ok(())
    }
}

impl FetchConfig {
    /// Check that every fetch setting is usable
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config(
                "batch_size must be greater than zero",
                "batch_size",
            ));
        }
        if self.rate_limit_per_second == 0 {
            return Err(Error::config(
                "rate_limit_per_second must be greater than zero",
                "rate_limit_per_second",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(Error::config(
                "max_concurrency must be greater than zero",
                "max_concurrency",
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config(
                "request_timeout must be greater than zero",
                "request_timeout",
            ));
        }
        if let Err(e) = url::Url::parse(&self.base_url) {
            return Err(Error::config(
                format!("base_url '{}' is not a valid URL: {}", self.base_url, e),
                "base_url",
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://rest.kegg.jp".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_rate_limit_per_second() -> u32 {
    3
}

fn default_max_concurrency() -> usize {
    4
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("kegg-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./kegg_data")
}

fn default_db_name() -> String {
    "kegg".to_string()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
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
