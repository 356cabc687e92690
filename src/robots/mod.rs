//! Robots.txt handling module
//!
//! This module fetches and evaluates a site's robots.txt before any page on
//! it is requested. A missing or unreachable robots.txt never blocks a fetch.

mod parser;

pub use parser::ParsedRobots;

use crate::cache::CacheAside;
use crate::HarvestError;
use reqwest::Client;
use url::Url;

/// Cache namespace for robots.txt bodies
pub const ROBOTS_NAMESPACE: &str = "robots_txt";

/// Derives the robots.txt URL for a page: same scheme, host and port, no credentials
///
/// # Arguments
///
/// * `url` - Any absolute page URL
///
/// # Returns
///
/// * `Ok(Url)` - `<scheme>://<host[:port]>/robots.txt`
/// * `Err(HarvestError)` - The URL has no host
pub fn robots_url_for(url: &Url) -> Result<Url, HarvestError> {
    if url.host_str().is_none() {
        return Err(HarvestError::MissingHost {
            url: url.to_string(),
        });
    }

    let mut robots = url.clone();
    // Credentials of the page URL are not sent to robots.txt
    if robots.set_username("").is_err() || robots.set_password(None).is_err() {
        return Err(HarvestError::MissingHost {
            url: url.to_string(),
        });
    }
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    Ok(robots)
}

/// Fetches a robots.txt body
///
/// # Returns
///
/// * `Some(String)` - The body of a 2xx response
/// * `None` - Non-2xx response or network failure; there is no enforceable policy
pub async fn fetch_robots(client: &Client, robots_url: &Url) -> Option<String> {
    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("robots.txt fetch failed for {}: {}", robots_url, e);
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            "No robots.txt at {} (status {})",
            robots_url,
            response.status()
        );
        return None;
    }

    match response.text().await {
        Ok(body) => Some(body),
        Err(e) => {
            tracing::debug!("Unreadable robots.txt at {}: {}", robots_url, e);
            None
        }
    }
}

/// Decides whether a URL may be fetched under its site's robots.txt
///
/// Every call evaluates the current robots.txt of the target host. When a
/// cache is attached, robots.txt bodies are memoized per robots.txt URL with
/// the cache's TTL; otherwise each call fetches it fresh.
#[derive(Debug, Clone)]
pub struct RobotsChecker {
    client: Client,
    cache: Option<CacheAside>,
}

impl RobotsChecker {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: None,
        }
    }

    /// Memoizes robots.txt bodies in `cache`, under [`ROBOTS_NAMESPACE`]
    pub fn with_cache(mut self, cache: CacheAside) -> Self {
        self.cache = Some(cache.with_namespace(ROBOTS_NAMESPACE));
        self
    }

    /// Checks if `url` may be fetched by `user_agent`
    ///
    /// # Arguments
    ///
    /// * `url` - The page URL
    /// * `user_agent` - The product token matched against `User-agent` groups
    ///
    /// # Returns
    ///
    /// `false` only when a fetched robots.txt explicitly disallows the URL.
    /// Malformed URLs, missing files and network errors all yield `true`.
    pub async fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        let target = match Url::parse(url) {
            Ok(target) => target,
            Err(_) => return true,
        };

        let robots_url = match robots_url_for(&target) {
            Ok(robots_url) => robots_url,
            Err(_) => return true,
        };

        self.load(&robots_url).await.is_allowed(target.as_str(), user_agent)
    }

    async fn load(&self, robots_url: &Url) -> ParsedRobots {
        let body = match &self.cache {
            Some(cache) => {
                cache
                    .get_or_compute(robots_url.as_str(), || fetch_robots(&self.client, robots_url))
                    .await
            }
            None => fetch_robots(&self.client, robots_url).await,
        };

        ParsedRobots::from(body)
    }
}
