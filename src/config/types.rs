use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Page-Harvest
///
/// Every section is optional in the TOML file; missing sections take their
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Fetch and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Number of attempts per URL before giving up
    pub max_retries: u32,

    /// Base backoff delay (milliseconds)
    pub base_delay_ms: u64,

    /// Backoff ceiling (milliseconds)
    pub max_delay_ms: u64,

    /// Per-request HTTP timeout (seconds)
    pub request_timeout_secs: u64,

    /// Deadline for every URL of a batch (seconds), unbounded when absent
    pub overall_timeout_secs: Option<u64>,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            request_timeout_secs: 30,
            overall_timeout_secs: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,

    /// Product token matched against robots.txt `User-agent` groups
    pub robots_agent: String,
}

impl UserAgentConfig {
    /// Full `User-Agent` header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "PageHarvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/page-harvest".to_string(),
            contact_email: "crawler@example.com".to_string(),
            robots_agent: "LinkedInBot".to_string(),
        }
    }
}

/// Which cache store backs the cache layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Caching disabled
    None,
    /// In-process map, lost on exit
    Memory,
    /// SQLite file shared by every process pointing at it
    Sqlite,
}

/// Cache layer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// SQLite file for the `sqlite` backend
    pub database_path: Option<PathBuf>,

    /// Entry lifetime (seconds)
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            database_path: None,
            ttl_secs: 6 * 60 * 60,
        }
    }
}
