//! Cookies set on and discarded from outgoing responses.

use std::fmt::Write as _;
use std::time::{Duration as StdDuration, SystemTime, UNIX_EPOCH};

use chrono::Duration;

/// `SameSite` attribute of a cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// A cookie to be set on the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub max_age: Option<Duration>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    /// A session cookie with secure defaults (`Secure`, `HttpOnly`, `SameSite=Lax`, path `/`).
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            path: "/".to_string(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: Some(SameSite::Lax),
        }
    }

    /// Renders the value of a `Set-Cookie` header.
    pub fn to_header_value(&self) -> String {
        let mut header = format!("{}={}", self.name, self.value);
        if let Some(max_age) = self.max_age {
            let seconds = max_age.num_seconds().max(0);
            let expires = SystemTime::now() + StdDuration::from_secs(seconds as u64);
            let _ = write!(
                header,
                "; Max-Age={}; Expires={}",
                seconds,
                httpdate::fmt_http_date(expires)
            );
        }
        let _ = write!(header, "; Path={}", self.path);
        if let Some(domain) = &self.domain {
            let _ = write!(header, "; Domain={}", domain);
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.same_site {
            let _ = write!(header, "; SameSite={}", same_site.as_str());
        }
        header
    }
}

/// Instructs the client to drop a cookie.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscardingCookie {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
}

impl DiscardingCookie {
    pub fn to_header_value(&self) -> String {
        let mut header = format!(
            "{}=; Max-Age=0; Expires={}; Path={}",
            self.name,
            httpdate::fmt_http_date(UNIX_EPOCH),
            self.path
        );
        if let Some(domain) = &self.domain {
            let _ = write!(header, "; Domain={}", domain);
        }
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

/// Shape of a cookie used to transport some piece of authentication state.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    /// `None` creates a session cookie.
    pub max_age: Option<Duration>,
}

impl CookieSettings {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: "/".to_string(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: Some(SameSite::Lax),
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn cookie(&self, value: impl Into<String>) -> Cookie {
        Cookie {
            name: self.name.clone(),
            value: value.into(),
            max_age: self.max_age,
            path: self.path.clone(),
            domain: self.domain.clone(),
            secure: self.secure,
            http_only: self.http_only,
            same_site: self.same_site,
        }
    }

    pub fn discarding(&self) -> DiscardingCookie {
        DiscardingCookie {
            name: self.name.clone(),
            path: self.path.clone(),
            domain: self.domain.clone(),
            secure: self.secure,
        }
    }
}
