//! Direct scraping of the HTML-only DuckDuckGo results page.
//!
//! This path never fails outright: transport errors and empty pages turn
//! into a single synthetic result explaining what happened.

use super::{SearchConfig, SearchError, SearchResult};
use crate::dom::{self, DomNode};
use crate::headers::USER_AGENT;
use reqwest::header;
use reqwest::redirect::Policy;
use std::time::Duration;
use url::Url;

const BACKEND: &str = "DuckDuckGo";

pub(crate) async fn search(config: &SearchConfig, query: &str) -> Vec<SearchResult> {
    tracing::debug!(proxied = config.proxy_url.is_some(), "using fallback search backend");

    match fetch_results_page(config, query).await {
        Ok(html) => {
            let results = parse_results(&html, config.max_fallback_results);
            tracing::debug!(count = results.len(), "fallback search parsed");
            if results.is_empty() {
                vec![SearchResult::notice(
                    "No results found",
                    format!("No results found for '{query}'"),
                )]
            } else {
                results
            }
        }
        Err(SearchError::Timeout(_)) => {
            tracing::error!("fallback search timed out");
            vec![SearchResult::notice(
                "Search Timeout",
                "The search request timed out. Please try again.".to_string(),
            )]
        }
        Err(e) => {
            tracing::error!(error = %e, "fallback search failed");
            vec![SearchResult::notice(
                "Search Error",
                "An error occurred while searching. Please try again.".to_string(),
            )]
        }
    }
}

async fn fetch_results_page(config: &SearchConfig, query: &str) -> Result<String, SearchError> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fallback_timeout_secs))
        .redirect(Policy::limited(config.fallback_max_redirects));
    if let Some(ref proxy_url) = config.proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| SearchError::Config(format!("invalid proxy: {e}")))?;
        builder = builder.proxy(proxy);
    }
    let client = builder
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))?;

    client
        .get(&config.fallback_url)
        .query(&[("q", query)])
        .header(header::USER_AGENT, USER_AGENT)
        .header(header::ACCEPT_LANGUAGE, "en-US")
        .send()
        .await
        .map_err(|e| SearchError::from_transport(BACKEND, e))?
        .error_for_status()
        .map_err(|e| SearchError::from_transport(BACKEND, e))?
        .text()
        .await
        .map_err(|e| SearchError::from_transport(BACKEND, e))
}

/// Parse up to `limit` result blocks, skipping any block that does not
/// yield a valid result.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let document = dom::parse_html(html);

    document
        .find_all(&|node| node.tag == "div" && node.has_class("result"))
        .into_iter()
        .take(limit)
        .filter_map(|block| match parse_block(block) {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::debug!(error = %e, "skipping search result block");
                None
            }
        })
        .collect()
}

fn parse_block(block: &DomNode) -> Result<SearchResult, SearchError> {
    let link = block
        .find_first(&|node| node.tag == "a" && node.has_class("result__a"))
        .ok_or_else(|| SearchError::Parse("result block has no title link".into()))?;

    let title = link.text_content();
    let href = link.get_attr("href").unwrap_or("").trim();
    if href.is_empty() {
        return Err(SearchError::Parse("title link has no href".into()));
    }

    let snippet = block
        .find_first(&|node| node.tag == "a" && node.has_class("result__snippet"))
        .map(DomNode::text_content)
        .unwrap_or_default();

    let result = SearchResult {
        title,
        url: normalize_url(&unwrap_redirect(href)),
        snippet,
    };
    if !result.is_valid() {
        return Err(SearchError::Parse("result block has an empty title".into()));
    }
    Ok(result)
}

/// Decode the real destination out of a `duckduckgo.com/l/?uddg=` wrapper.
/// Anything else is returned unchanged.
pub fn unwrap_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with("/l/") {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };

    if let Ok(parsed) = Url::parse(&absolute) {
        let is_wrapper = parsed
            .host_str()
            .is_some_and(|host| host == "duckduckgo.com" || host.ends_with(".duckduckgo.com"))
            && parsed.path().starts_with("/l/");
        if is_wrapper {
            if let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "uddg") {
                return target.into_owned();
            }
        }
    }
    href.to_string()
}

/// Give protocol-relative and bare-host URLs an `https` scheme.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}
