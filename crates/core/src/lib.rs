//! Privacy-enforcing fetch and search pipeline.
//!
//! A [`policy::PolicyStore`] holds the active privacy mode. Everything else
//! takes a [`policy::PolicyBundle`] snapshot and applies it: outbound header
//! sets, cookie handling, script and embed stripping, proxy routing.

pub mod cookies;
pub mod dom;
pub mod headers;
pub mod policy;
pub mod sanitize;
pub mod script;
#[cfg(feature = "fetch")]
pub mod fetch;
#[cfg(feature = "fetch")]
pub mod search;

pub use policy::{PolicyBundle, PolicyStore, PrivacyMode};

/// Fetch `url` under a policy snapshot with default transport limits.
/// This is the primary entry point for page loads.
#[cfg(feature = "fetch")]
pub async fn fetch(
    url: &str,
    policy: &PolicyBundle,
) -> Result<fetch::FetchOutcome, fetch::FetchError> {
    fetch::PageFetcher::new(policy.clone(), fetch::FetchConfig::default())
        .fetch(url)
        .await
}
