//! Per-URL and per-batch outcomes
//!
//! A [`FetchOutcome`] is produced once per URL per invocation and never
//! mutated afterwards. A [`BatchOutcome`] is assembled from them by the bulk
//! crawler and keeps the caller's URL order.

use serde::{Deserialize, Serialize};

/// Message used when robots.txt blocks a URL
pub const ROBOTS_DISALLOWED: &str = "Crawling disallowed by robots.txt";

/// Message used when the attempt limit leaves no attempt to make
pub const NO_ATTEMPTS_LEFT: &str = "Maximum retry attempts reached";

/// Prefix of the aggregate error of a partially failed batch
pub const BATCH_FAILURE_SUMMARY: &str = "Failed to crawl some websites:";

/// Result of fetching a single URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Page fetched and extracted to markdown
    Success { content: String },

    /// Page could not be fetched; `reason` names the cause
    Failure { reason: String },
}

impl FetchOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        Self::Success {
            content: content.into(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Extracted content, if the fetch succeeded
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Success { content } => Some(content),
            Self::Failure { .. } => None,
        }
    }

    /// Failure reason, if the fetch failed
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason } => Some(reason),
        }
    }

    /// Classifies a failure by its cause, `None` on success
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.reason().map(FailureKind::classify)
    }
}

/// Cause of a failed fetch
///
/// Derived from the failure message so that outcomes restored from the cache
/// classify exactly like fresh ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// robots.txt disallows the URL; permanent
    PolicyBlocked,
    /// Every attempt returned a non-2xx status
    HttpStatusExhausted,
    /// Every attempt failed at the connection level
    NetworkExhausted,
    /// The batch deadline elapsed before the fetch finished
    TimedOut,
    /// The batch was cancelled by the caller
    Cancelled,
    /// The attempt limit was zero, so nothing was requested
    NoAttempts,
    /// Malformed input or any other unexpected error
    Unexpected,
}

impl FailureKind {
    pub fn classify(reason: &str) -> Self {
        if reason.contains("robots.txt") {
            Self::PolicyBlocked
        } else if reason.starts_with("Failed to fetch website after") {
            Self::HttpStatusExhausted
        } else if reason.starts_with("Network error after") {
            Self::NetworkExhausted
        } else if reason.starts_with("Crawl timed out") {
            Self::TimedOut
        } else if reason.starts_with("Crawl cancelled") {
            Self::Cancelled
        } else if reason == NO_ATTEMPTS_LEFT {
            Self::NoAttempts
        } else {
            Self::Unexpected
        }
    }

    /// Whether trying the same input again later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpStatusExhausted | Self::NetworkExhausted | Self::TimedOut | Self::Cancelled => {
                true
            }
            Self::PolicyBlocked | Self::NoAttempts | Self::Unexpected => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PolicyBlocked => "policy_blocked",
            Self::HttpStatusExhausted => "http_status_exhausted",
            Self::NetworkExhausted => "network_exhausted",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::NoAttempts => "no_attempts",
            Self::Unexpected => "unexpected",
        }
    }
}

/// One entry of a batch: the requested URL and what happened to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlOutcome {
    pub url: String,
    pub outcome: FetchOutcome,
}

impl UrlOutcome {
    pub fn new(url: impl Into<String>, outcome: FetchOutcome) -> Self {
        Self {
            url: url.into(),
            outcome,
        }
    }
}

/// Aggregated result of a bulk crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Outcomes in the order the URLs were requested
    pub per_url: Vec<UrlOutcome>,

    /// True iff every entry is a success
    pub overall_success: bool,

    /// Summary line followed by `url: reason` for every failed entry
    pub aggregate_error: Option<String>,
}

impl BatchOutcome {
    /// Builds a batch outcome, deriving the verdict and aggregate error
    pub fn from_results(per_url: Vec<UrlOutcome>) -> Self {
        let failures: Vec<String> = per_url
            .iter()
            .filter_map(|entry| {
                entry
                    .outcome
                    .reason()
                    .map(|reason| format!("{}: {}", entry.url, reason))
            })
            .collect();

        let aggregate_error = if failures.is_empty() {
            None
        } else {
            Some(format!("{}\n{}", BATCH_FAILURE_SUMMARY, failures.join("\n")))
        };

        Self {
            overall_success: aggregate_error.is_none(),
            aggregate_error,
            per_url,
        }
    }

    pub fn len(&self) -> usize {
        self.per_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_url.is_empty()
    }

    /// Successful entries, in request order
    pub fn successes(&self) -> impl Iterator<Item = &UrlOutcome> {
        self.per_url.iter().filter(|e| e.outcome.is_success())
    }

    /// Failed entries, in request order
    pub fn failures(&self) -> impl Iterator<Item = &UrlOutcome> {
        self.per_url.iter().filter(|e| !e.outcome.is_success())
    }
}
