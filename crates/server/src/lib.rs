//! Loopback REST service over the Obscura privacy core.
//!
//! Exposes "fetch a URL under the current policy" and "search a query under
//! the current policy", plus reading and switching the privacy mode.

pub mod preferences;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use obscura_core::cookies::{CookieSanitizer, SharedCookieJar};
use obscura_core::fetch::{FetchConfig, FetchError, FetchOutcome, PageFetcher};
use obscura_core::policy::PolicyError;
use obscura_core::search::{SearchClient, SearchConfig, SearchEngine, SearchError, SearchResult};
use obscura_core::{PolicyBundle, PolicyStore, PrivacyMode};
use serde::{Deserialize, Serialize};

use crate::preferences::{Preferences, SearchBackend};

// ---------------------------------------------------------------------------
// Configuration and state
// ---------------------------------------------------------------------------

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub search: SearchConfig,
    pub fetch: FetchConfig,
    /// Preferences file consulted for the initial mode and the search
    /// backend. `None` means built-in defaults.
    pub preferences_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            search: SearchConfig::default(),
            fetch: FetchConfig::default(),
            preferences_path: Preferences::default_path(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The search client in use, and the inputs it was built from.
struct CachedSearch {
    backend: SearchBackend,
    proxy_url: Option<String>,
    client: Arc<SearchClient>,
}

/// Shared server state.
pub struct AppState {
    policy: PolicyStore,
    config: ServerConfig,
    cookies: Mutex<SharedCookieJar>,
    search: Mutex<Option<CachedSearch>>,
}

impl AppState {
    /// Start in the mode stored in the preferences file.
    pub fn new(config: ServerConfig) -> Self {
        let prefs = Preferences::load(config.preferences_path.as_deref());
        Self::with_mode(config, prefs.privacy_mode)
    }

    pub fn with_mode(config: ServerConfig, mode: PrivacyMode) -> Self {
        let jar = CookieSanitizer::from_policy(&PolicyBundle::for_mode(mode)).shared();
        Self {
            policy: PolicyStore::with_mode(mode),
            config,
            cookies: Mutex::new(jar),
            search: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn mode(&self) -> PrivacyMode {
        self.policy.mode()
    }

    /// Switch modes. A real change starts a fresh session cookie jar, so
    /// cookies never carry over into another mode.
    pub fn set_mode(&self, value: &str) -> Result<PrivacyMode, PolicyError> {
        let previous = self.policy.mode();
        let mode = self.policy.set_mode(value)?;
        if mode != previous {
            let jar = CookieSanitizer::from_policy(&PolicyBundle::for_mode(mode)).shared();
            *self.cookies.lock().unwrap_or_else(PoisonError::into_inner) = jar;
        }
        Ok(mode)
    }

    fn cookie_jar(&self) -> SharedCookieJar {
        Arc::clone(&self.cookies.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Return the search client for the preferred backend under `policy`.
    ///
    /// The client is reused while neither the backend preference nor the
    /// proxy changes, which keeps its fallback state alive between calls.
    async fn search_client(&self, policy: &PolicyBundle) -> Result<Arc<SearchClient>, SearchError> {
        let backend = Preferences::load_async(self.config.preferences_path.as_deref())
            .await
            .search_engine;
        let mut cached = self.search.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(current) = cached.as_ref() {
            if current.backend == backend && current.proxy_url == policy.proxy_url {
                return Ok(Arc::clone(&current.client));
            }
        }

        let config = self.config.search.clone().with_policy(policy);
        config.validate()?;
        tracing::info!(%backend, proxied = config.proxy_url.is_some(), "search client configured");

        let client = Arc::new(SearchClient::new(config, backend.forces_primary()));
        *cached = Some(CachedSearch {
            backend,
            proxy_url: policy.proxy_url.clone(),
            client: Arc::clone(&client),
        });
        Ok(client)
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub engines: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ModeRequest {
    pub mode: String,
}

#[derive(Debug, Serialize)]
pub struct ModeResponse {
    pub mode: PrivacyMode,
}

#[derive(Debug, Serialize)]
pub struct ModeChanged {
    pub status: &'static str,
    pub mode: PrivacyMode,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Errors as they cross the service boundary. Messages name the bad input
/// or the coarse failure kind, never transport internals.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Request timed out")]
    GatewayTimeout,

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PolicyError> for ApiError {
    fn from(e: PolicyError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::InvalidUrl(_) => ApiError::BadRequest(e.to_string()),
            FetchError::Timeout => ApiError::GatewayTimeout,
            FetchError::Http(status) => {
                ApiError::BadGateway(format!("Upstream returned HTTP {status}"))
            }
            FetchError::Network(_) => ApiError::BadGateway("Network error".to_string()),
        }
    }
}

fn parse_engines(names: &[String]) -> Result<Vec<SearchEngine>, ApiError> {
    names
        .iter()
        .map(|name| {
            name.parse::<SearchEngine>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", post(search))
        .route("/fetch", post(fetch))
        .route("/mode", get(get_mode).post(set_mode))
        .with_state(state)
}

/// Bind the configured address and serve until the process is stopped.
pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    let addr = config.addr();
    if let Ok(ip) = config.host.parse::<IpAddr>() {
        if !ip.is_loopback() {
            tracing::warn!(%addr, "binding to a non-loopback address");
        }
    }

    let state = Arc::new(AppState::new(config));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, mode = %state.mode(), "obscura service listening");
    axum::serve(listener, build_router(state)).await
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// POST /search  { query, mode?, engines? }
async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let engines = req.engines.as_deref().map(parse_engines).transpose()?;
    if let Some(mode) = req.mode.as_deref() {
        state.set_mode(mode)?;
    }

    let policy = state.policy.policy();
    tracing::debug!(query = %req.query, mode = %state.mode(), "search request");

    let client = state.search_client(&policy).await.map_err(|e| {
        tracing::error!(error = %e, "search client misconfigured");
        ApiError::Internal("Search failed")
    })?;
    let results = client.search(&req.query, engines.as_deref()).await;
    tracing::info!(
        count = results.len(),
        fallback = client.is_using_fallback(),
        "search completed"
    );

    Ok(Json(SearchResponse { results }))
}

/// POST /fetch  { url }
async fn fetch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FetchRequest>,
) -> Result<Json<FetchOutcome>, ApiError> {
    let fetcher = PageFetcher::with_cookie_jar(
        state.policy.policy(),
        state.config.fetch.clone(),
        state.cookie_jar(),
    );
    tracing::debug!(url = %req.url, "fetch request");

    let outcome = fetcher.fetch(&req.url).await.map_err(|e| {
        match &e {
            FetchError::InvalidUrl(_) => tracing::debug!(error = %e, "fetch rejected"),
            _ => tracing::warn!(error = %e, "fetch failed"),
        }
        ApiError::from(e)
    })?;
    tracing::info!(
        requires_script = outcome.requires_script,
        bytes = outcome.html.len(),
        "fetch completed"
    );

    Ok(Json(outcome))
}

/// GET /mode
async fn get_mode(State(state): State<Arc<AppState>>) -> Json<ModeResponse> {
    Json(ModeResponse { mode: state.mode() })
}

/// POST /mode  { mode }
async fn set_mode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ModeRequest>,
) -> Result<Json<ModeChanged>, ApiError> {
    let mode = state.set_mode(&req.mode)?;
    Ok(Json(ModeChanged { status: "ok", mode }))
}
