//! Cached page fetching
//!
//! Wraps any [`PageFetcher`] so each URL is fetched at most once per TTL
//! window. A batch with nine cached URLs and one new URL triggers exactly one
//! live fetch.

use crate::cache::{CacheAside, CacheStore};
use crate::crawler::PageFetcher;
use crate::outcome::FetchOutcome;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Cache namespace for page fetch outcomes
pub const FETCH_NAMESPACE: &str = "fetch_one";

/// Every input that affects a fetch outcome
#[derive(Debug, Serialize)]
struct FetchKey<'a> {
    url: &'a str,
    max_retries: u32,
}

/// A page fetcher with cache-aside memoization
///
/// Both successes and failures are cached; an entry is refreshed only after it
/// expires.
#[derive(Debug)]
pub struct CachedFetcher<F> {
    inner: F,
    cache: CacheAside,
}

impl<F: PageFetcher> CachedFetcher<F> {
    pub fn new(inner: F, store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: CacheAside::new(store, FETCH_NAMESPACE, ttl),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for CachedFetcher<F> {
    async fn fetch_one(&self, url: &str, max_retries: u32) -> FetchOutcome {
        let key = FetchKey { url, max_retries };
        self.cache
            .get_or_compute(&key, || self.inner.fetch_one(url, max_retries))
            .await
    }
}
