//! Evaluation of a single robots.txt body

use robotstxt::DefaultMatcher;

/// The robots.txt policy of one host
///
/// `None` means the host has no enforceable policy (missing file, server
/// error, unreachable); everything is allowed then.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRobots {
    body: Option<String>,
}

impl ParsedRobots {
    pub fn from_body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
        }
    }

    /// A host without a robots.txt
    pub fn no_policy() -> Self {
        Self::default()
    }

    /// Whether a robots.txt body was found
    pub fn has_policy(&self) -> bool {
        self.body.is_some()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Checks `url` against the group matching `user_agent`
    ///
    /// Follows the Google matcher: the most specific `Allow`/`Disallow` rule
    /// wins, unknown lines are ignored, and a blank body allows everything.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.body.as_deref() {
            Some(body) if !body.trim().is_empty() => {
                DefaultMatcher::default().one_agent_allowed_by_robots(body, user_agent, url)
            }
            _ => true,
        }
    }
}

impl From<Option<String>> for ParsedRobots {
    fn from(body: Option<String>) -> Self {
        Self { body }
    }
}
