//! Crawler module for page fetching
//!
//! This module contains the core fetching logic, including:
//! - The [`PageFetcher`] seam shared by live and cached fetchers
//! - HTTP fetching with robots.txt checks and retry logic
//! - Concurrent bulk fetching with order-preserving aggregation

mod bulk;
mod fetcher;
mod retry;

pub use bulk::{BulkCrawler, CANCELLED};
pub use fetcher::{build_http_client, Fetcher};
pub use retry::{
    RetryPolicy, RetryState, RetryStep, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY,
    DEFAULT_MAX_RETRIES,
};

use crate::outcome::FetchOutcome;
use async_trait::async_trait;
use std::sync::Arc;

/// Fetches a single URL into a [`FetchOutcome`]
///
/// Implementations never fail outright; every problem becomes a
/// `FetchOutcome::Failure` with a cause-distinguishing reason.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`, trying at most `max_retries` times
    async fn fetch_one(&self, url: &str, max_retries: u32) -> FetchOutcome;
}

#[async_trait]
impl<T> PageFetcher for Arc<T>
where
    T: PageFetcher + ?Sized,
{
    async fn fetch_one(&self, url: &str, max_retries: u32) -> FetchOutcome {
        self.as_ref().fetch_one(url, max_retries).await
    }
}
