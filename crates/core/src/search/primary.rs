//! Metasearch aggregator backend (JSON API).

use super::{SearchConfig, SearchEngine, SearchError, SearchResult};
use serde::Deserialize;
use std::time::Duration;

const BACKEND: &str = "search aggregator";

#[derive(Debug, Deserialize)]
struct AggregatorResponse {
    #[serde(default)]
    results: Vec<AggregatorItem>,
}

#[derive(Debug, Deserialize)]
struct AggregatorItem {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
}

/// Query the aggregator for `query`, restricted to `engines`.
pub(crate) async fn search(
    config: &SearchConfig,
    query: &str,
    engines: &[SearchEngine],
) -> Result<Vec<SearchResult>, SearchError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.primary_timeout_secs))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))?;

    let engines = engines
        .iter()
        .map(SearchEngine::as_str)
        .collect::<Vec<_>>()
        .join(",");
    let endpoint = format!("{}/search", config.primary_url.trim_end_matches('/'));

    let body = client
        .get(endpoint)
        .query(&[("q", query), ("format", "json"), ("engines", engines.as_str())])
        .send()
        .await
        .map_err(|e| SearchError::from_transport(BACKEND, e))?
        .error_for_status()
        .map_err(|e| SearchError::from_transport(BACKEND, e))?
        .text()
        .await
        .map_err(|e| SearchError::from_transport(BACKEND, e))?;

    parse_response(&body)
}

/// Map an aggregator JSON body into results, dropping entries without a
/// title or URL.
pub fn parse_response(body: &str) -> Result<Vec<SearchResult>, SearchError> {
    let response: AggregatorResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("{BACKEND} response: {e}")))?;

    Ok(response
        .results
        .into_iter()
        .map(|item| SearchResult {
            title: item.title.unwrap_or_default(),
            url: item.url.unwrap_or_default(),
            snippet: item.content.unwrap_or_default(),
        })
        .filter(SearchResult::is_valid)
        .collect())
}
