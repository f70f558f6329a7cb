//! Search client with sticky failover from the aggregator to direct scraping.
//!
//! The primary backend is a local metasearch aggregator answering JSON. The
//! fallback scrapes the HTML-only DuckDuckGo endpoint. Once the primary
//! fails, a [`SearchClient`] never goes back to it.

pub mod fallback;
pub mod primary;

use crate::policy::PolicyBundle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

/// Engines the aggregator is asked for when the caller names none.
pub const DEFAULT_ENGINES: [SearchEngine; 3] = [
    SearchEngine::DuckDuckGo,
    SearchEngine::Bing,
    SearchEngine::Wikipedia,
];

/// Engines the primary aggregator can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    DuckDuckGo,
    Bing,
    Wikipedia,
    Google,
    Brave,
    Startpage,
    Qwant,
    Mojeek,
}

impl SearchEngine {
    /// Name the aggregator uses for this engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuckDuckGo => "duckduckgo",
            Self::Bing => "bing",
            Self::Wikipedia => "wikipedia",
            Self::Google => "google",
            Self::Brave => "brave",
            Self::Startpage => "startpage",
            Self::Qwant => "qwant",
            Self::Mojeek => "mojeek",
        }
    }

    pub fn all() -> &'static [SearchEngine] {
        &[
            Self::DuckDuckGo,
            Self::Bing,
            Self::Wikipedia,
            Self::Google,
            Self::Brave,
            Self::Startpage,
            Self::Qwant,
            Self::Mojeek,
        ]
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchEngine {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|engine| engine.as_str() == s)
            .ok_or_else(|| SearchError::InvalidEngine(s.to_string()))
    }
}

/// A single search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchResult {
    /// A real result needs both a title and a URL; the snippet is optional.
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty() && !self.url.is_empty()
    }

    /// A synthetic, URL-less result used to tell the user something went wrong.
    pub(crate) fn notice(title: &str, snippet: String) -> Self {
        Self {
            title: title.to_string(),
            url: String::new(),
            snippet,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid search engine: {0}")]
    InvalidEngine(String),

    #[error("search timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),
}

impl SearchError {
    /// Classify a transport error, tagging it with the backend that produced it.
    pub(crate) fn from_transport(backend: &str, err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            SearchError::Timeout(format!("{backend} did not answer in time"))
        } else if err.is_decode() {
            SearchError::Parse(format!("{backend} response: {err}"))
        } else {
            SearchError::Http(format!("{backend}: {err}"))
        }
    }
}

/// Where the backends live and how long to wait for them.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Base URL of the metasearch aggregator.
    pub primary_url: String,
    /// HTML results endpoint of the fallback backend.
    pub fallback_url: String,
    pub primary_timeout_secs: u64,
    pub fallback_timeout_secs: u64,
    /// Redirects the fallback request may follow.
    pub fallback_max_redirects: usize,
    pub health_timeout_secs: u64,
    /// How many result blocks of the fallback page are looked at.
    pub max_fallback_results: usize,
    /// Proxy for the fallback backend. The aggregator is local and is
    /// always reached directly.
    pub proxy_url: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            primary_url: "http://127.0.0.1:8888".to_string(),
            fallback_url: "https://html.duckduckgo.com/html/".to_string(),
            primary_timeout_secs: 10,
            fallback_timeout_secs: 10,
            fallback_max_redirects: 10,
            health_timeout_secs: 5,
            max_fallback_results: 10,
            proxy_url: None,
        }
    }
}

impl SearchConfig {
    /// Route fallback traffic the way the policy routes page fetches.
    pub fn with_policy(mut self, policy: &PolicyBundle) -> Self {
        self.proxy_url = policy.proxy_url.clone();
        self
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        for (name, value) in [
            ("primary_url", &self.primary_url),
            ("fallback_url", &self.fallback_url),
        ] {
            Url::parse(value).map_err(|e| SearchError::Config(format!("{name}: {e}")))?;
        }
        if self.primary_timeout_secs == 0
            || self.fallback_timeout_secs == 0
            || self.health_timeout_secs == 0
        {
            return Err(SearchError::Config(
                "timeouts must be greater than 0".into(),
            ));
        }
        if self.max_fallback_results == 0 {
            return Err(SearchError::Config(
                "max_fallback_results must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

pub struct SearchClient {
    config: SearchConfig,
    using_fallback: AtomicBool,
}

impl SearchClient {
    /// With `force_primary` the aggregator is tried first; otherwise the
    /// client starts out on the fallback backend.
    pub fn new(config: SearchConfig, force_primary: bool) -> Self {
        Self {
            config,
            using_fallback: AtomicBool::new(!force_primary),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::Acquire)
    }

    /// Search `query`, returning results in backend relevance order.
    ///
    /// A blank query returns nothing without touching the network. The
    /// fallback path always yields at least one entry, synthetic if need be.
    pub async fn search(&self, query: &str, engines: Option<&[SearchEngine]>) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        if !self.is_using_fallback() {
            let engines = match engines {
                Some(engines) if !engines.is_empty() => engines,
                _ => &DEFAULT_ENGINES[..],
            };
            match primary::search(&self.config, query, engines).await {
                Ok(results) => {
                    tracing::debug!(count = results.len(), "primary search backend answered");
                    return results;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "primary search backend failed, switching to fallback");
                    self.using_fallback.store(true, Ordering::Release);
                }
            }
        }

        fallback::search(&self.config, query).await
    }

    /// Check the aggregator's root endpoint. Never consulted by [`search`](Self::search).
    pub async fn health_check(&self) -> bool {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.health_timeout_secs))
            .build()
        {
            Ok(client) => client,
            Err(_) => return false,
        };
        let url = format!("{}/", self.config.primary_url.trim_end_matches('/'));
        match client.get(url).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::debug!(error = %e.without_url(), "search backend health check failed");
                false
            }
        }
    }
}
