//! Policy-driven page fetching.
//! Gated behind the "fetch" feature flag.
//!
//! Each [`PageFetcher`] works from one [`PolicyBundle`] snapshot. Mode
//! changes made while a fetch is in flight only affect later fetchers.

use crate::cookies::{parse_session_cookie, CookieSanitizer, SharedCookieJar};
use crate::headers::{self, HeaderList};
use crate::policy::PolicyBundle;
use crate::sanitize::sanitize_html;
use crate::script;
use reqwest::redirect::Policy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::PoisonError;
use std::time::Duration;
use url::Url;

/// Transport limits for page fetching.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Total request timeout in seconds, redirects included.
    pub timeout_secs: u64,
    /// Maximum redirects followed before giving up.
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_redirects: 5,
        }
    }
}

/// Sanitized page plus the script-requirement signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub html: String,
    #[serde(rename = "requiresScript")]
    pub requires_script: bool,
    /// Final response headers with tracking headers removed.
    #[serde(skip)]
    pub headers: HeaderList,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP error: {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err.without_url().to_string())
        }
    }
}

/// Accept only absolute `http`/`https` URLs with a host.
pub fn validate_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    Ok(parsed)
}

pub struct PageFetcher {
    policy: PolicyBundle,
    config: FetchConfig,
    cookies: SharedCookieJar,
}

impl PageFetcher {
    /// A fetcher with its own empty cookie jar.
    pub fn new(policy: PolicyBundle, config: FetchConfig) -> Self {
        let cookies = CookieSanitizer::from_policy(&policy).shared();
        Self::with_cookie_jar(policy, config, cookies)
    }

    /// A fetcher replaying (and feeding) a jar owned by the caller.
    pub fn with_cookie_jar(policy: PolicyBundle, config: FetchConfig, cookies: SharedCookieJar) -> Self {
        Self {
            policy,
            config,
            cookies,
        }
    }

    pub fn policy(&self) -> &PolicyBundle {
        &self.policy
    }

    pub fn cookie_jar(&self) -> &SharedCookieJar {
        &self.cookies
    }

    /// Outbound headers for `url`: the policy's fixed set plus any session cookies.
    pub fn request_headers(&self, url: &str) -> HeaderList {
        let mut headers = headers::sanitize_request_headers(self.policy.minimal_headers);
        let cookie = self
            .cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cookie_header_for_request(url);
        if let Some(cookie) = cookie {
            headers.push(("Cookie".to_string(), cookie));
        }
        headers
    }

    fn build_client(&self) -> Result<Client, FetchError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .redirect(Policy::limited(self.config.max_redirects));

        if let Some(ref proxy_url) = self.policy.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| FetchError::Network(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(FetchError::from_transport)
    }

    /// Fetch a page, then sanitize it under the fetcher's policy.
    pub async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let parsed_url = validate_url(url)?;
        let request_headers = self.request_headers(parsed_url.as_str());
        let client = self.build_client()?;

        tracing::debug!(url = %parsed_url, proxied = self.policy.proxy_url.is_some(), "fetching page");

        let response = client
            .get(parsed_url)
            .headers(headers::to_header_map(&request_headers))
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            tracing::debug!(status = status.as_u16(), "page fetch failed");
            return Err(FetchError::Http(status.as_u16()));
        }

        let raw_headers = headers::from_header_map(response.headers());
        self.remember_session_cookies(&raw_headers);

        let body = response.text().await.map_err(FetchError::from_transport)?;

        let (html, requires_script) =
            script::apply(&sanitize_html(&body, &self.policy), self.policy.javascript);

        tracing::debug!(requires_script, bytes = html.len(), "page sanitized");

        Ok(FetchOutcome {
            html,
            requires_script,
            headers: headers::filter_response_headers(&raw_headers),
        })
    }

    fn remember_session_cookies(&self, response_headers: &[(String, String)]) {
        let mut jar = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        if !jar.allows_session_cookies() {
            return;
        }
        for (_, value) in response_headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
        {
            if let Some((name, value)) = parse_session_cookie(value) {
                jar.store_session_cookie(&name, &value);
            }
        }
    }
}
