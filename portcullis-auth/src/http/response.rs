//! The parts of an outgoing response that authentication writes to.

use std::collections::{BTreeMap, BTreeSet};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::StatusCode;
use tracing::warn;

use super::{Cookie, DiscardingCookie};

/// Status, headers, cookies and session changes of a response.
///
/// Authenticator services and providers only merge their own entries into a
/// response, everything else set by the application is preserved.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    discarding_cookies: Vec<DiscardingCookie>,
    session: BTreeMap<String, String>,
    removed_session_keys: BTreeSet<String>,
}

impl OutgoingResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            discarding_cookies: Vec::new(),
            session: BTreeMap::new(),
            removed_session_keys: BTreeSet::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// A `303 See Other` redirect.
    pub fn redirect(location: &str) -> Self {
        let response = Self::new(StatusCode::SEE_OTHER);
        match HeaderValue::from_str(location) {
            Ok(value) => response.with_header(LOCATION, value),
            Err(e) => {
                warn!("Dropping invalid redirect location {}: {}", location, e);
                response
            }
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Sets a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    /// Sets a cookie, replacing a pending cookie or discard with the same name.
    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.retain(|c| c.name != cookie.name);
        self.discarding_cookies.retain(|c| c.name != cookie.name);
        self.cookies.push(cookie);
        self
    }

    /// Discards a cookie on the client, dropping a pending cookie with the same name.
    pub fn discarding_cookie(mut self, cookie: DiscardingCookie) -> Self {
        self.cookies.retain(|c| c.name != cookie.name);
        self.discarding_cookies.retain(|c| c.name != cookie.name);
        self.discarding_cookies.push(cookie);
        self
    }

    pub fn with_session_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.removed_session_keys.remove(&key);
        self.session.insert(key, value.into());
        self
    }

    pub fn without_session_value(mut self, key: &str) -> Self {
        self.session.remove(key);
        self.removed_session_keys.insert(key.to_string());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION.as_str())
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn discarding_cookies(&self) -> &[DiscardingCookie] {
        &self.discarding_cookies
    }

    pub fn session_value(&self, key: &str) -> Option<&str> {
        self.session.get(key).map(String::as_str)
    }

    pub fn session(&self) -> &BTreeMap<String, String> {
        &self.session
    }

    pub fn removed_session_keys(&self) -> &BTreeSet<String> {
        &self.removed_session_keys
    }

    /// Values for the `Set-Cookie` headers of this response.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.cookies
            .iter()
            .map(Cookie::to_header_value)
            .chain(
                self.discarding_cookies
                    .iter()
                    .map(DiscardingCookie::to_header_value),
            )
            .collect()
    }
}

impl Default for OutgoingResponse {
    fn default() -> Self {
        Self::ok()
    }
}
