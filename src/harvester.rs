//! Assembly of the crawl pipeline from configuration
//!
//! [`Harvester`] wires the HTTP client, robots.txt checker, cache store,
//! observer and bulk crawler together:
//!
//! ```text
//! fetch_all -> BulkCrawler -> per URL: CachedFetcher -> Fetcher -> {RobotsChecker, GET, extract}
//! ```

use crate::cache::{CacheAside, CacheStore, CachedFetcher, MemoryStore, SqliteStore};
use crate::config::{CacheBackend, CacheConfig, Config};
use crate::crawler::{build_http_client, BulkCrawler, Fetcher, PageFetcher, RetryPolicy};
use crate::observe::{CrawlObserver, TracingObserver};
use crate::outcome::{BatchOutcome, FetchOutcome};
use crate::robots::RobotsChecker;
use crate::{HarvestError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A configured crawl pipeline
pub struct Harvester {
    crawler: BulkCrawler<dyn PageFetcher>,
    max_retries: u32,
}

impl Harvester {
    /// Builds the pipeline with structured `tracing` observation
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to fetch
    /// * `Err(HarvestError)` - The HTTP client or cache store could not be created
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_observer(config, Arc::new(TracingObserver))
    }

    /// Builds the pipeline reporting to `observer`
    pub fn from_config_with_observer(config: &Config, observer: Arc<dyn CrawlObserver>) -> Result<Self> {
        let client = build_http_client(&config.user_agent, config.crawler.request_timeout())?;
        let store = open_store(&config.cache)?;

        let mut robots = RobotsChecker::new(client.clone());
        if let Some(store) = &store {
            robots = robots.with_cache(CacheAside::new(
                Arc::clone(store),
                crate::robots::ROBOTS_NAMESPACE,
                config.cache.ttl(),
            ));
        }

        let fetcher = Fetcher::new(client, robots, config.user_agent.robots_agent.clone())
            .with_retry_policy(RetryPolicy::from_config(&config.crawler))
            .with_observer(Arc::clone(&observer));

        let fetcher: Arc<dyn PageFetcher> = match store {
            Some(store) => Arc::new(CachedFetcher::new(fetcher, store, config.cache.ttl())),
            None => Arc::new(fetcher),
        };

        let crawler = BulkCrawler::new(fetcher)
            .with_default_max_retries(config.crawler.max_retries)
            .with_overall_timeout(config.crawler.overall_timeout())
            .with_observer(observer);

        Ok(Self {
            crawler,
            max_retries: config.crawler.max_retries,
        })
    }

    /// Fetches one URL through the cache
    pub async fn fetch_one(&self, url: &str, max_retries: Option<u32>) -> FetchOutcome {
        self.crawler
            .fetcher()
            .fetch_one(url, max_retries.unwrap_or(self.max_retries))
            .await
    }

    /// Fetches a batch of URLs; see [`BulkCrawler::fetch_all`]
    pub async fn fetch_all<S: AsRef<str>>(&self, urls: &[S], max_retries: Option<u32>) -> BatchOutcome {
        self.crawler.fetch_all(urls, max_retries).await
    }

    /// Fetches a batch of URLs, stopping pending fetches once `cancel` fires
    pub async fn fetch_all_with_cancel<S: AsRef<str>>(
        &self,
        urls: &[S],
        max_retries: Option<u32>,
        cancel: CancellationToken,
    ) -> BatchOutcome {
        self.crawler
            .fetch_all_with_cancel(urls, max_retries, cancel)
            .await
    }
}

/// Opens the configured cache store, `None` when caching is disabled
fn open_store(config: &CacheConfig) -> Result<Option<Arc<dyn CacheStore>>> {
    let store: Arc<dyn CacheStore> = match config.backend {
        CacheBackend::None => return Ok(None),
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
        CacheBackend::Sqlite => {
            let path = config.database_path.as_deref().ok_or_else(|| {
                HarvestError::Config(crate::ConfigError::Validation(
                    "database_path is required for the sqlite cache backend".to_string(),
                ))
            })?;
            tracing::debug!("Opening cache database {}", path.display());
            Arc::new(SqliteStore::open(path)?)
        }
    };
    Ok(Some(store))
}
