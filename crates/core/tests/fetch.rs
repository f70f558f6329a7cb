//! Tests for the page fetcher against a local mock server.

#![cfg(feature = "fetch")]

use obscura_core::cookies::CookieSanitizer;
use obscura_core::fetch::{validate_url, FetchConfig, FetchError, PageFetcher};
use obscura_core::sanitize::IMAGE_PLACEHOLDER;
use obscura_core::{PolicyBundle, PrivacyMode};
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const PAGE: &str = r#"<html><body>
<h1 onclick="track()">News</h1>
<img src="/pixel.gif" width="1" height="1">
<img src="/photo.jpg" alt="photo">
<iframe src="https://ads.example/frame"></iframe>
<script src="/app.js"></script>
<a href="javascript:void(0)">menu</a>
</body></html>"#;

fn fetcher(mode: PrivacyMode) -> PageFetcher {
    PageFetcher::new(PolicyBundle::for_mode(mode), FetchConfig::default())
}

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

#[test]
fn test_validate_url_accepts_http_and_https() {
    assert!(validate_url("http://example.com").is_ok());
    assert!(validate_url("https://example.com/a?b=c").is_ok());
}

#[test]
fn test_validate_url_rejects_other_input() {
    for bad in ["ftp://x", "file:///etc/passwd", "not-a-url", "javascript:alert(1)", "", "http://"] {
        assert!(
            matches!(validate_url(bad), Err(FetchError::InvalidUrl(_))),
            "accepted {bad:?}"
        );
    }
}

#[tokio::test]
async fn test_invalid_scheme_never_reaches_network() {
    let err = fetcher(PrivacyMode::Standard).fetch("ftp://x").await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl(_)));
}

#[tokio::test]
async fn test_lite_fetch_sanitizes_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(html_response(PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = fetcher(PrivacyMode::Lite)
        .fetch(&format!("{}/article", server.uri()))
        .await
        .unwrap();

    assert!(!outcome.requires_script, "scripts are gone before detection runs");
    assert!(!outcome.html.contains("<script"));
    assert!(!outcome.html.contains("<iframe"));
    assert!(!outcome.html.contains("pixel.gif"));
    assert!(!outcome.html.contains("onclick"));
    assert!(!outcome.html.contains("javascript:"));
    assert!(!outcome.html.contains("<img"));
    assert!(outcome.html.contains(IMAGE_PLACEHOLDER));
    assert!(outcome.html.contains("<h1 >News</h1>"));
}

#[tokio::test]
async fn test_standard_fetch_keeps_scripts_and_images() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html_response(PAGE))
        .mount(&server)
        .await;

    let outcome = fetcher(PrivacyMode::Standard)
        .fetch(&format!("{}/article", server.uri()))
        .await
        .unwrap();

    assert!(outcome.requires_script);
    assert!(outcome.html.contains(r#"<script src="/app.js"></script>"#));
    assert!(outcome.html.contains("photo.jpg"));
    assert!(outcome.html.contains("onclick"));
    assert!(!outcome.html.contains("pixel.gif"), "tracking pixels go regardless");
    assert!(!outcome.html.contains("<iframe"));
    assert!(!outcome.html.contains(IMAGE_PLACEHOLDER));
}

#[tokio::test]
async fn test_script_heavy_page_flag_follows_sanitized_html() {
    let server = MockServer::start().await;
    let body = format!("<p>hi</p>{}", "<script>x()</script>".repeat(6));
    Mock::given(method("GET"))
        .respond_with(html_response(&body))
        .mount(&server)
        .await;

    let lite = fetcher(PrivacyMode::Lite).fetch(&server.uri()).await.unwrap();
    assert!(!lite.requires_script);
    assert_eq!(lite.html, "<p>hi</p>");

    let standard = fetcher(PrivacyMode::Standard).fetch(&server.uri()).await.unwrap();
    assert!(standard.requires_script);
    assert_eq!(standard.html, body);
}

#[tokio::test]
async fn test_external_script_flag_depends_on_mode() {
    let server = MockServer::start().await;
    let body = r#"<p>hi</p><script src="/app.js"></script>"#;
    Mock::given(method("GET"))
        .respond_with(html_response(body))
        .mount(&server)
        .await;

    for (mode, expected) in [
        (PrivacyMode::Lite, false),
        (PrivacyMode::Tor, false),
        (PrivacyMode::Standard, true),
    ] {
        let page_fetcher = if mode == PrivacyMode::Tor {
            // Same policy minus the proxy, so the mock stays reachable.
            let mut policy = PolicyBundle::for_mode(mode);
            policy.proxy_url = None;
            PageFetcher::new(policy, FetchConfig::default())
        } else {
            fetcher(mode)
        };
        let outcome = page_fetcher.fetch(&server.uri()).await.unwrap();
        assert_eq!(outcome.requires_script, expected, "mode {mode}");
    }
}

#[tokio::test]
async fn test_minimal_headers_sent_in_lite_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "Obscura/1.0"))
        .and(header("accept-language", "en-US"))
        .and(header("dnt", "1"))
        .respond_with(html_response("<p>ok</p>"))
        .expect(1)
        .mount(&server)
        .await;

    fetcher(PrivacyMode::Lite).fetch(&server.uri()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("upgrade-insecure-requests").is_none());
    assert!(requests[0].headers.get("cookie").is_none());
}

#[tokio::test]
async fn test_standard_headers_sent_in_standard_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("upgrade-insecure-requests", "1"))
        .respond_with(html_response("<p>ok</p>"))
        .expect(1)
        .mount(&server)
        .await;

    fetcher(PrivacyMode::Standard).fetch(&server.uri()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let language = requests[0].headers.get("accept-language").unwrap();
    assert_eq!(language.to_str().unwrap(), "en-US,en;q=0.9");
}

#[tokio::test]
async fn test_session_cookies_replayed_when_allowed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            html_response("<p>welcome</p>")
                .append_header("set-cookie", "sid=abc123; Path=/; HttpOnly")
                .append_header("set-cookie", "tracker=1; Max-Age=31536000"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/inbox"))
        .and(header("cookie", "sid=abc123"))
        .respond_with(html_response("<p>inbox</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(PrivacyMode::Standard);
    let first = fetcher.fetch(&format!("{}/login", server.uri())).await.unwrap();
    assert!(first
        .headers
        .iter()
        .all(|(name, _)| !name.eq_ignore_ascii_case("set-cookie")));

    let second = fetcher.fetch(&format!("{}/inbox", server.uri())).await.unwrap();
    assert!(second.html.contains("inbox"));
}

#[tokio::test]
async fn test_cookies_never_stored_in_lite_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html_response("<p>x</p>").append_header("set-cookie", "sid=abc"))
        .mount(&server)
        .await;

    let fetcher = fetcher(PrivacyMode::Lite);
    fetcher.fetch(&server.uri()).await.unwrap();
    fetcher.fetch(&server.uri()).await.unwrap();

    assert!(fetcher.cookie_jar().lock().unwrap().is_empty());
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r: &Request| r.headers.get("cookie").is_none()));
}

#[tokio::test]
async fn test_shared_jar_is_replayed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_exists("cookie"))
        .and(header("cookie", "a=1; b=2"))
        .respond_with(html_response("<p>ok</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut jar = CookieSanitizer::new(true);
    jar.store_session_cookie("a", "1");
    jar.store_session_cookie("b", "2");
    let fetcher = PageFetcher::with_cookie_jar(
        PolicyBundle::for_mode(PrivacyMode::Standard),
        FetchConfig::default(),
        jar.shared(),
    );
    fetcher.fetch(&server.uri()).await.unwrap();
}

#[tokio::test]
async fn test_response_headers_are_filtered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            html_response("<p>x</p>")
                .insert_header("x-frame-options", "DENY")
                .insert_header("content-security-policy", "default-src 'self'")
                .insert_header("x-request-id", "42"),
        )
        .mount(&server)
        .await;

    let outcome = fetcher(PrivacyMode::Standard).fetch(&server.uri()).await.unwrap();
    let names: Vec<_> = outcome.headers.iter().map(|(n, _)| n.as_str()).collect();
    assert!(names.contains(&"x-request-id"));
    assert!(!names.contains(&"x-frame-options"));
    assert!(!names.contains(&"content-security-policy"));
}

#[tokio::test]
async fn test_error_status_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = fetcher(PrivacyMode::Lite).fetch(&server.uri()).await.unwrap_err();
    assert!(matches!(err, FetchError::Http(404)));
    assert_eq!(err.to_string(), "HTTP error: 404");
}

#[tokio::test]
async fn test_redirects_followed_up_to_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html_response("<p>moved</p>"))
        .mount(&server)
        .await;

    let outcome = fetcher(PrivacyMode::Lite)
        .fetch(&format!("{}/old", server.uri()))
        .await
        .unwrap();
    assert_eq!(outcome.html, "<p>moved</p>");
}

#[tokio::test]
async fn test_redirect_loop_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let err = fetcher(PrivacyMode::Lite)
        .fetch(&format!("{}/loop", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html_response("<p>late</p>").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let fetcher = PageFetcher::new(
        PolicyBundle::for_mode(PrivacyMode::Lite),
        FetchConfig {
            timeout_secs: 1,
            ..Default::default()
        },
    );
    let err = fetcher.fetch(&server.uri()).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout));
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    // Port 9 (discard) on loopback is closed in test environments.
    let err = fetcher(PrivacyMode::Lite)
        .fetch("http://127.0.0.1:9/")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network(_)), "got {err:?}");
}

#[test]
fn test_outcome_wire_format() {
    let outcome = obscura_core::fetch::FetchOutcome {
        html: "<p>x</p>".to_string(),
        requires_script: true,
        headers: vec![("a".to_string(), "b".to_string())],
    };
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json, serde_json::json!({"html": "<p>x</p>", "requiresScript": true}));
}
