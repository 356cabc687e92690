//! Page-Harvest: a polite bulk page fetcher
//!
//! This crate fetches a batch of URLs concurrently, honours robots.txt,
//! retries transient failures with exponential backoff, extracts readable
//! article content as markdown and memoizes per-URL outcomes in a shared
//! cache store.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod harvester;
pub mod observe;
pub mod outcome;
pub mod robots;

use thiserror::Error;

/// Main error type for Page-Harvest operations
///
/// These never escape the bulk crawler: the single-URL fetcher turns every
/// one of them into a [`FetchOutcome::Failure`].
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: ::url::ParseError,
    },

    #[error("Unsupported URL scheme '{scheme}' in {url}")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("URL has no host: {url}")]
    MissingHost { url: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Cache store errors
///
/// Callers of the cache layer absorb these: a failing store behaves like a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for Page-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for cache store operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{BulkCrawler, Fetcher, PageFetcher, RetryPolicy};
pub use harvester::Harvester;
pub use outcome::{BatchOutcome, FailureKind, FetchOutcome, UrlOutcome};
