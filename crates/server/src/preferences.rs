//! Read-only view of the user's preferences file.
//!
//! The desktop shell owns this file and writes it; the service only reads
//! it, once at startup for the initial mode and again before each search
//! to pick the search backend.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use obscura_core::PrivacyMode;
use serde::Deserialize;

/// Search backend the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// Scrape DuckDuckGo directly.
    #[default]
    DuckDuckGo,
    /// Use the local metasearch aggregator, falling back only on failure.
    Searxng,
}

impl SearchBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuckDuckGo => "duckduckgo",
            Self::Searxng => "searxng",
        }
    }

    /// Whether a search client should try the aggregator first.
    pub fn forces_primary(&self) -> bool {
        matches!(self, Self::Searxng)
    }
}

impl fmt::Display for SearchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Renderer {
    #[default]
    Text,
    Web,
}

/// Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub privacy_mode: PrivacyMode,
    pub search_engine: SearchBackend,
    pub renderer: Renderer,
}

impl Preferences {
    /// Default location: `~/.obscura/preferences.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".obscura").join("preferences.json"))
    }

    /// Load from `path`, or return defaults when there is no path, no file,
    /// or the file cannot be understood.
    pub fn load(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::from_read(path, fs::read_to_string(path)),
            None => Self::default(),
        }
    }

    /// [`load`](Self::load) without blocking the async runtime.
    pub async fn load_async(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::from_read(path, tokio::fs::read_to_string(path).await),
            None => Self::default(),
        }
    }

    fn from_read(path: &Path, read: std::io::Result<String>) -> Self {
        let raw = match read {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no preferences file, using defaults");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read preferences");
                return Self::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed preferences, using defaults");
                Self::default()
            }
        }
    }
}
