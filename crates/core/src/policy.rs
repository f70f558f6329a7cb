//! Privacy modes and the policy bundle each one derives.
//!
//! A [`PolicyStore`] owns the active [`PrivacyMode`] and hands out
//! [`PolicyBundle`] snapshots. Call sites only ever see the bundle, never
//! the mode comparison logic behind it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

/// SOCKS endpoint of a local Tor daemon.
pub const TOR_SOCKS_PROXY: &str = "socks5://127.0.0.1:9050";

/// One of the three named privacy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyMode {
    /// No scripts, cookies or images; minimal headers.
    #[default]
    Lite,
    /// Scripts, cookies and images allowed; richer headers.
    Standard,
    /// Like `Lite`, with all traffic routed through Tor.
    Tor,
}

impl PrivacyMode {
    pub const ALL: [PrivacyMode; 3] = [PrivacyMode::Lite, PrivacyMode::Standard, PrivacyMode::Tor];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyMode::Lite => "lite",
            PrivacyMode::Standard => "standard",
            PrivacyMode::Tor => "tor",
        }
    }
}

impl fmt::Display for PrivacyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lite" => Ok(PrivacyMode::Lite),
            "standard" => Ok(PrivacyMode::Standard),
            "tor" => Ok(PrivacyMode::Tor),
            other => Err(PolicyError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid privacy mode: {0}")]
    InvalidMode(String),
}

/// Concrete settings derived from a [`PrivacyMode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBundle {
    pub javascript: bool,
    pub cookies: bool,
    pub images: bool,
    pub minimal_headers: bool,
    pub proxy_url: Option<String>,
}

impl PolicyBundle {
    /// Table lookup; the bundle depends on nothing but the mode.
    pub fn for_mode(mode: PrivacyMode) -> Self {
        match mode {
            PrivacyMode::Lite => Self {
                javascript: false,
                cookies: false,
                images: false,
                minimal_headers: true,
                proxy_url: None,
            },
            PrivacyMode::Standard => Self {
                javascript: true,
                cookies: true,
                images: true,
                minimal_headers: false,
                proxy_url: None,
            },
            PrivacyMode::Tor => Self {
                javascript: false,
                cookies: false,
                images: false,
                minimal_headers: true,
                proxy_url: Some(TOR_SOCKS_PROXY.to_string()),
            },
        }
    }

    /// Scheme prefixes routed through the proxy, if any.
    ///
    /// Both plain and TLS traffic go through the same endpoint so that no
    /// request can bypass it by scheme.
    pub fn proxy_routes(&self) -> Vec<(&'static str, &str)> {
        match self.proxy_url.as_deref() {
            Some(proxy) => vec![("http://", proxy), ("https://", proxy)],
            None => Vec::new(),
        }
    }
}

impl From<PrivacyMode> for PolicyBundle {
    fn from(mode: PrivacyMode) -> Self {
        Self::for_mode(mode)
    }
}

/// Holder of the active privacy mode.
///
/// Only the mode scalar is stored, and the bundle is derived on read, so a
/// reader racing a writer sees either the old bundle or the new one.
#[derive(Debug, Default)]
pub struct PolicyStore {
    mode: RwLock<PrivacyMode>,
}

impl PolicyStore {
    /// A store starting in [`PrivacyMode::Lite`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: PrivacyMode) -> Self {
        Self {
            mode: RwLock::new(mode),
        }
    }

    /// Parse and apply a mode name.
    pub fn set_mode(&self, value: &str) -> Result<PrivacyMode, PolicyError> {
        let mode: PrivacyMode = value.parse()?;
        self.set(mode);
        Ok(mode)
    }

    pub fn set(&self, mode: PrivacyMode) {
        let mut current = self.mode.write().unwrap_or_else(PoisonError::into_inner);
        if *current != mode {
            tracing::info!(from = %*current, to = %mode, "privacy mode changed");
        }
        *current = mode;
    }

    pub fn mode(&self) -> PrivacyMode {
        *self.mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the bundle for the current mode.
    pub fn policy(&self) -> PolicyBundle {
        PolicyBundle::for_mode(self.mode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names_round_trip() {
        for mode in PrivacyMode::ALL {
            assert_eq!(mode.as_str().parse::<PrivacyMode>().unwrap(), mode);
        }
    }

    #[test]
    fn mode_parsing_is_case_sensitive() {
        assert!("Lite".parse::<PrivacyMode>().is_err());
        assert!(" tor".parse::<PrivacyMode>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&PrivacyMode::Standard).unwrap();
        assert_eq!(json, "\"standard\"");
        let mode: PrivacyMode = serde_json::from_str("\"tor\"").unwrap();
        assert_eq!(mode, PrivacyMode::Tor);
    }
}
