//! Observability hooks
//!
//! Crawl components report finished fetches and batches to an injected
//! [`CrawlObserver`]. The default hooks do nothing, so an absent or disabled
//! sink never changes crawl behavior.

use crate::outcome::{BatchOutcome, FailureKind, FetchOutcome};
use std::time::Duration;

/// A finished single-URL fetch
#[derive(Debug, Clone)]
pub struct FetchEvent<'a> {
    pub operation: &'static str,
    pub url: &'a str,
    pub max_retries: u32,
    pub success: bool,
    pub failure_kind: Option<FailureKind>,
    pub content_length: Option<usize>,
    pub duration: Duration,
}

impl<'a> FetchEvent<'a> {
    pub fn new(
        operation: &'static str,
        url: &'a str,
        max_retries: u32,
        outcome: &FetchOutcome,
        duration: Duration,
    ) -> Self {
        Self {
            operation,
            url,
            max_retries,
            success: outcome.is_success(),
            failure_kind: outcome.failure_kind(),
            content_length: outcome.content().map(str::len),
            duration,
        }
    }
}

/// A finished batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEvent {
    pub url_count: usize,
    pub success_count: usize,
    pub overall_success: bool,
    pub duration: Duration,
}

impl BatchEvent {
    pub fn new(batch: &BatchOutcome, duration: Duration) -> Self {
        Self {
            url_count: batch.len(),
            success_count: batch.successes().count(),
            overall_success: batch.overall_success,
            duration,
        }
    }
}

/// Receives crawl events; every hook defaults to a no-op
pub trait CrawlObserver: Send + Sync {
    fn on_fetch_complete(&self, _event: &FetchEvent<'_>) {}

    fn on_batch_complete(&self, _event: &BatchEvent) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CrawlObserver for NoopObserver {}

/// Observer that emits structured `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn on_fetch_complete(&self, event: &FetchEvent<'_>) {
        tracing::info!(
            operation = event.operation,
            url = event.url,
            max_retries = event.max_retries,
            success = event.success,
            failure_kind = event.failure_kind.map(|k| k.as_str()),
            content_length = event.content_length,
            duration_ms = event.duration.as_millis() as u64,
            "fetch complete"
        );
    }

    fn on_batch_complete(&self, event: &BatchEvent) {
        tracing::info!(
            url_count = event.url_count,
            success_count = event.success_count,
            overall_success = event.overall_success,
            duration_ms = event.duration.as_millis() as u64,
            "batch complete"
        );
    }
}
