//! Bulk crawling
//!
//! Fans a page fetcher out over a batch of URLs, one task per URL, and
//! reassembles the outcomes in request order. A failing URL never cancels its
//! siblings.

use crate::crawler::retry::DEFAULT_MAX_RETRIES;
use crate::crawler::PageFetcher;
use crate::observe::{BatchEvent, CrawlObserver, NoopObserver};
use crate::outcome::{BatchOutcome, FetchOutcome, UrlOutcome};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Failure reason of a task stopped by the caller's cancellation token
pub const CANCELLED: &str = "Crawl cancelled";

/// Fetches batches of URLs concurrently
///
/// Concurrency is one task per URL with no upper bound; callers with large
/// URL lists split them into batches themselves.
pub struct BulkCrawler<F: ?Sized> {
    fetcher: Arc<F>,
    default_max_retries: u32,
    overall_timeout: Option<Duration>,
    observer: Arc<dyn CrawlObserver>,
}

impl<F> BulkCrawler<F>
where
    F: PageFetcher + ?Sized + 'static,
{
    pub fn new(fetcher: Arc<F>) -> Self {
        Self {
            fetcher,
            default_max_retries: DEFAULT_MAX_RETRIES,
            overall_timeout: None,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Attempt limit used when a batch does not override it
    pub fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    /// Deadline applied to every URL of a batch
    pub fn with_overall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn fetcher(&self) -> &Arc<F> {
        &self.fetcher
    }

    /// Fetches every URL concurrently and aggregates the outcomes
    ///
    /// # Arguments
    ///
    /// * `urls` - URLs to fetch, in the order results should be reported
    /// * `max_retries` - Attempt limit override; the crawler default when `None`
    ///
    /// # Returns
    ///
    /// One entry per input URL, same order, duplicates included. Never fails:
    /// per-URL problems are reported in the entries and the aggregate error.
    pub async fn fetch_all<S: AsRef<str>>(&self, urls: &[S], max_retries: Option<u32>) -> BatchOutcome {
        self.fetch_all_with_cancel(urls, max_retries, CancellationToken::new())
            .await
    }

    /// Like [`fetch_all`](Self::fetch_all), stopping every pending task once
    /// `cancel` fires
    ///
    /// Cancelled URLs are reported as failures; URLs that already finished
    /// keep their outcome.
    pub async fn fetch_all_with_cancel<S: AsRef<str>>(
        &self,
        urls: &[S],
        max_retries: Option<u32>,
        cancel: CancellationToken,
    ) -> BatchOutcome {
        let started = Instant::now();
        let max_retries = max_retries.unwrap_or(self.default_max_retries);

        tracing::info!("Crawling {} URLs (max {} attempts each)", urls.len(), max_retries);

        let handles: Vec<_> = urls
            .iter()
            .map(|url| {
                let fetcher = Arc::clone(&self.fetcher);
                let url = url.as_ref().to_string();
                let cancel = cancel.clone();
                let deadline = self.overall_timeout;

                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => FetchOutcome::failure(CANCELLED),
                        outcome = fetch_with_deadline(fetcher.as_ref(), &url, max_retries, deadline) => outcome,
                    }
                })
            })
            .collect();

        let per_url: Vec<UrlOutcome> = urls
            .iter()
            .zip(join_all(handles).await)
            .map(|(url, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    tracing::error!("Fetch task for {} failed: {}", url.as_ref(), e);
                    FetchOutcome::failure(format!("Unexpected error: {}", e))
                });
                UrlOutcome::new(url.as_ref(), outcome)
            })
            .collect();

        let batch = BatchOutcome::from_results(per_url);

        tracing::info!(
            "Crawled {} URLs: {} succeeded, {} failed",
            batch.len(),
            batch.successes().count(),
            batch.failures().count()
        );
        self.observer
            .on_batch_complete(&BatchEvent::new(&batch, started.elapsed()));

        batch
    }
}

async fn fetch_with_deadline<F>(
    fetcher: &F,
    url: &str,
    max_retries: u32,
    deadline: Option<Duration>,
) -> FetchOutcome
where
    F: PageFetcher + ?Sized,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, fetcher.fetch_one(url, max_retries)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!("Fetch of {} exceeded {:?}", url, limit);
                FetchOutcome::failure(format!("Crawl timed out after {}ms", limit.as_millis()))
            }
        },
        None => fetcher.fetch_one(url, max_retries).await,
    }
}
