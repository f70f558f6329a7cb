//! Outbound header sets and inbound header filtering.
//!
//! Outbound requests always carry one of two fixed header sets. Whatever
//! headers a caller had in mind are discarded, so nothing caller-specific
//! can end up fingerprinting the request.

/// Ordered list of header name/value pairs. Order and casing are kept as given.
pub type HeaderList = Vec<(String, String)>;

pub const USER_AGENT: &str = "Obscura/1.0";

/// Response headers that are dropped before anything else sees them.
pub const BLOCKED_RESPONSE_HEADERS: [&str; 7] = [
    "set-cookie",
    "set-cookie2",
    "x-frame-options",
    "content-security-policy",
    "strict-transport-security",
    "x-xss-protection",
    "x-content-type-options",
];

fn header_list(pairs: &[(&str, &str)]) -> HeaderList {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn minimal_headers() -> HeaderList {
    header_list(&[
        ("User-Agent", USER_AGENT),
        ("Accept-Language", "en-US"),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Encoding", "gzip, deflate"),
        ("DNT", "1"),
    ])
}

pub fn standard_headers() -> HeaderList {
    header_list(&[
        ("User-Agent", USER_AGENT),
        ("Accept-Language", "en-US,en;q=0.9"),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("DNT", "1"),
        ("Upgrade-Insecure-Requests", "1"),
    ])
}

/// Pick the outbound header set for a policy.
pub fn sanitize_request_headers(use_minimal: bool) -> HeaderList {
    if use_minimal {
        minimal_headers()
    } else {
        standard_headers()
    }
}

pub fn is_blocked_response_header(name: &str) -> bool {
    BLOCKED_RESPONSE_HEADERS
        .iter()
        .any(|blocked| name.eq_ignore_ascii_case(blocked))
}

/// Drop tracking and security-policy headers; everything else is kept verbatim.
pub fn filter_response_headers(headers: &[(String, String)]) -> HeaderList {
    headers
        .iter()
        .filter(|(name, _)| !is_blocked_response_header(name))
        .cloned()
        .collect()
}

/// Convert a header list for the transport. Entries that are not valid
/// header names or values are skipped.
#[cfg(feature = "fetch")]
pub fn to_header_map(headers: &[(String, String)]) -> reqwest::header::HeaderMap {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::debug!(header = %name, "skipping malformed header");
            continue;
        };
        map.append(name, value);
    }
    map
}

/// Collect a transport header map into a list, lossily decoding values.
#[cfg(feature = "fetch")]
pub fn from_header_map(map: &reqwest::header::HeaderMap) -> HeaderList {
    map.iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
