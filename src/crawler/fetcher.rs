//! HTTP fetcher implementation
//!
//! This module handles the fetch of a single URL:
//! - Building HTTP clients with proper user agent strings
//! - robots.txt policy check before any page request
//! - GET with bounded retries and exponential backoff
//! - Content extraction of successful responses
//! - Error classification into human-readable failure reasons

use crate::config::UserAgentConfig;
use crate::crawler::retry::{RetryPolicy, RetryState, RetryStep};
use crate::crawler::PageFetcher;
use crate::extract::extract;
use crate::observe::{CrawlObserver, FetchEvent, NoopObserver};
use crate::outcome::{FetchOutcome, NO_ATTEMPTS_LEFT, ROBOTS_DISALLOWED};
use crate::robots::RobotsChecker;
use crate::HarvestError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use page_harvest::config::UserAgentConfig;
/// use page_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Why a single attempt failed
#[derive(Debug)]
enum AttemptFailure {
    /// The server answered with a non-2xx status
    Status(StatusCode),
    /// No usable response (timeout, refused connection, DNS, broken body)
    Network(String),
}

impl AttemptFailure {
    fn into_outcome(self, attempts: u32) -> FetchOutcome {
        match self {
            Self::Status(status) => FetchOutcome::failure(format!(
                "Failed to fetch website after {} attempts: {}",
                attempts,
                describe_status(status)
            )),
            Self::Network(error) => FetchOutcome::failure(format!(
                "Network error after {} attempts: {}",
                attempts, error
            )),
        }
    }
}

/// Formats a status as code plus reason phrase, e.g. `500 Internal Server Error`
fn describe_status(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Classifies a transport error the way callers read it
fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else {
        error.to_string()
    }
}

/// Parses and checks a URL before any network I/O
fn parse_target(url: &str) -> Result<Url, HarvestError> {
    let target = Url::parse(url).map_err(|source| HarvestError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;

    match target.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(HarvestError::UnsupportedScheme {
                url: url.to_string(),
                scheme: scheme.to_string(),
            })
        }
    }

    if target.host_str().is_none() {
        return Err(HarvestError::MissingHost {
            url: url.to_string(),
        });
    }

    Ok(target)
}

/// Fetches one URL: policy check, GET with retries, extraction
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    robots: RobotsChecker,
    robots_agent: String,
    retry: RetryPolicy,
    observer: Arc<dyn CrawlObserver>,
}

impl Fetcher {
    /// Creates a fetcher with the default backoff curve and no observer
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for page requests
    /// * `robots` - Policy checker consulted before every page request
    /// * `robots_agent` - Product token evaluated against robots.txt
    pub fn new(client: Client, robots: RobotsChecker, robots_agent: impl Into<String>) -> Self {
        Self {
            client,
            robots,
            robots_agent: robots_agent.into(),
            retry: RetryPolicy::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Backoff curve used between attempts; the attempt limit comes per call
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Runs the fetch; `Err` is reserved for failures outside the retry loop
    async fn try_fetch(&self, url: &str, max_retries: u32) -> Result<FetchOutcome, HarvestError> {
        let target = parse_target(url)?;

        if !self.robots.is_allowed(target.as_str(), &self.robots_agent).await {
            tracing::info!("URL {} disallowed by robots.txt", url);
            return Ok(FetchOutcome::failure(ROBOTS_DISALLOWED));
        }

        let policy = self.retry.with_max_retries(max_retries);
        if !policy.allows_attempts() {
            tracing::warn!("No attempts allowed for {}", url);
            return Ok(FetchOutcome::failure(NO_ATTEMPTS_LEFT));
        }

        let mut state = RetryState::start();

        loop {
            tracing::debug!("Fetching {} (attempt {})", url, state.attempts() + 1);

            let failure = match self.client.get(target.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.text().await {
                        Ok(html) => return Ok(FetchOutcome::success(extract(&html))),
                        Err(e) => AttemptFailure::Network(describe_error(&e)),
                    }
                }
                Ok(response) => AttemptFailure::Status(response.status()),
                Err(e) => AttemptFailure::Network(describe_error(&e)),
            };

            match state.record_failure(&policy) {
                RetryStep::Exhausted { attempts } => {
                    tracing::warn!("Giving up on {} after {} attempts: {:?}", url, attempts, failure);
                    return Ok(failure.into_outcome(attempts));
                }
                RetryStep::Retry { delay, next } => {
                    tracing::debug!(
                        "Attempt {} for {} failed ({:?}), retrying in {:?}",
                        next.attempts(),
                        url,
                        failure,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    state = next;
                }
            }
        }
    }
}

#[async_trait]
impl PageFetcher for Fetcher {
    async fn fetch_one(&self, url: &str, max_retries: u32) -> FetchOutcome {
        let started = Instant::now();

        let outcome = self
            .try_fetch(url, max_retries)
            .await
            .unwrap_or_else(|e| FetchOutcome::failure(format!("Unexpected error: {}", e)));

        self.observer.on_fetch_complete(&FetchEvent::new(
            "fetch_one",
            url,
            max_retries,
            &outcome,
            started.elapsed(),
        ));

        outcome
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("robots_agent", &self.robots_agent)
            .field("retry", &self.retry)
            .finish()
    }
}
