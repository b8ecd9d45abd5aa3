//! The parts of an incoming request that authentication looks at.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

/// Request headers, cookies, query string and session, decoupled from any web framework.
///
/// Integrations convert their framework's request into an `IncomingRequest`
/// before handing it to providers and authenticator services.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    headers: HeaderMap,
    cookies: BTreeMap<String, String>,
    query: BTreeMap<String, Vec<String>>,
    session: BTreeMap<String, String>,
    host: Option<String>,
    path: String,
    secure: bool,
    remote_address: Option<String>,
}

impl IncomingRequest {
    pub fn new() -> Self {
        Self {
            path: "/".to_string(),
            ..Default::default()
        }
    }

    /// Builds a request from an absolute URL, taking over host, path, scheme and query string.
    pub fn from_url(url: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(url)?;
        let mut request = Self::new();
        request.secure = url.scheme() == "https";
        request.path = url.path().to_string();
        request.host = url.host_str().map(|host| match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        });
        for (name, value) in url.query_pairs() {
            request
                .query
                .entry(name.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        Ok(request)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Adds every cookie of a raw `Cookie` header (`a=1; b=2`).
    pub fn with_cookie_header(mut self, header: &str) -> Self {
        for pair in header.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                self.cookies
                    .insert(name.trim().to_string(), value.trim().to_string());
            }
        }
        self
    }

    pub fn without_cookie(mut self, name: &str) -> Self {
        self.cookies.remove(name);
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_session_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.session.insert(key.into(), value.into());
        self
    }

    pub fn without_session_value(mut self, key: &str) -> Self {
        self.session.remove(key);
        self
    }

    pub fn with_remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value, if present and valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn query_params(&self) -> &BTreeMap<String, Vec<String>> {
        &self.query
    }

    pub fn session_value(&self, key: &str) -> Option<&str> {
        self.session.get(key).map(String::as_str)
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    /// Resolves a root-relative URL (`/callback`) against this request's scheme and host.
    ///
    /// Absolute URLs, and relative ones when the host is unknown, are returned unchanged.
    pub fn absolute_url(&self, url: &str) -> String {
        match (&self.host, url.starts_with('/')) {
            (Some(host), true) => {
                let scheme = if self.secure { "https" } else { "http" };
                format!("{}://{}{}", scheme, host, url)
            }
            _ => url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::USER_AGENT;

    #[test]
    fn test_from_url_parses_query_and_host() {
        let request =
            IncomingRequest::from_url("https://example.com:8443/authenticate/google?code=abc&state=x%20y")
                .unwrap();

        assert!(request.is_secure());
        assert_eq!(request.host(), Some("example.com:8443"));
        assert_eq!(request.path(), "/authenticate/google");
        assert_eq!(request.query_param("code"), Some("abc"));
        assert_eq!(request.query_param("state"), Some("x y"));
        assert_eq!(request.query_param("missing"), None);
    }

    #[test]
    fn test_cookie_header_is_split() {
        let request = IncomingRequest::new().with_cookie_header("id=1-abc-def; OAuth2State=token");
        assert_eq!(request.cookie("id"), Some("1-abc-def"));
        assert_eq!(request.cookie("OAuth2State"), Some("token"));
    }

    #[test]
    fn test_absolute_url() {
        let request = IncomingRequest::from_url("http://localhost:9000/").unwrap();
        assert_eq!(
            request.absolute_url("/callback"),
            "http://localhost:9000/callback"
        );
        assert_eq!(
            request.absolute_url("https://other.example/cb"),
            "https://other.example/cb"
        );
        assert_eq!(IncomingRequest::new().absolute_url("/callback"), "/callback");
    }

    #[test]
    fn test_headers_and_session() {
        let request = IncomingRequest::new()
            .with_header(USER_AGENT, HeaderValue::from_static("test-agent"))
            .with_session_value("authenticator", "blob");
        assert_eq!(request.header("user-agent"), Some("test-agent"));
        assert_eq!(request.session_value("authenticator"), Some("blob"));
        assert_eq!(
            request
                .without_session_value("authenticator")
                .session_value("authenticator"),
            None
        );
    }
}
