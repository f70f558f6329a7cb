//! Cookie stripping and an opt-in session cookie jar.
//!
//! The jar is a single global one: cookies are not scoped to the URL they
//! are sent to. Only session cookies are ever retained, and only when the
//! policy allows cookies at all.

use crate::headers::HeaderList;
use crate::policy::PolicyBundle;
use std::sync::{Arc, Mutex};

/// A jar shared between the fetcher and whoever owns the browsing session.
pub type SharedCookieJar = Arc<Mutex<CookieSanitizer>>;

#[derive(Debug, Clone, Default)]
pub struct CookieSanitizer {
    allow_session_cookies: bool,
    jar: Vec<(String, String)>,
}

impl CookieSanitizer {
    pub fn new(allow_session_cookies: bool) -> Self {
        Self {
            allow_session_cookies,
            jar: Vec::new(),
        }
    }

    pub fn from_policy(policy: &PolicyBundle) -> Self {
        Self::new(policy.cookies)
    }

    pub fn shared(self) -> SharedCookieJar {
        Arc::new(Mutex::new(self))
    }

    pub fn allows_session_cookies(&self) -> bool {
        self.allow_session_cookies
    }

    /// Remove `Set-Cookie` and `Set-Cookie2`, leaving all other headers alone.
    pub fn strip_from_response_headers(&self, headers: &[(String, String)]) -> HeaderList {
        headers
            .iter()
            .filter(|(name, _)| {
                !name.eq_ignore_ascii_case("set-cookie") && !name.eq_ignore_ascii_case("set-cookie2")
            })
            .cloned()
            .collect()
    }

    /// The `Cookie` header value to send, in insertion order.
    ///
    /// `_url` does not scope the jar; every stored cookie goes to every host.
    pub fn cookie_header_for_request(&self, _url: &str) -> Option<String> {
        if !self.allow_session_cookies || self.jar.is_empty() {
            return None;
        }
        let header = self
            .jar
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }

    /// Remember a cookie. Re-storing a name replaces its value in place.
    pub fn store_session_cookie(&mut self, name: &str, value: &str) {
        if !self.allow_session_cookies {
            return;
        }
        match self.jar.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.jar.push((name.to_string(), value.to_string())),
        }
    }

    pub fn clear_session_cookies(&mut self) {
        self.jar.clear();
    }

    pub fn len(&self) -> usize {
        self.jar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jar.is_empty()
    }
}

/// Parse a `Set-Cookie` value, returning its name and value only if it is a
/// session cookie (no `Expires` and no `Max-Age` attribute).
pub fn parse_session_cookie(set_cookie: &str) -> Option<(String, String)> {
    let mut parts = set_cookie.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let persistent = parts.any(|attr| {
        let key = attr.split('=').next().unwrap_or("").trim();
        key.eq_ignore_ascii_case("expires") || key.eq_ignore_ascii_case("max-age")
    });
    if persistent {
        return None;
    }

    Some((name.to_string(), value.trim().to_string()))
}
