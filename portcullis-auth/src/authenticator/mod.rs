//! Authenticators and the services that manage their lifecycle.
//!
//! An [`Authenticator`] tracks an authenticated session for a [`LoginInfo`].
//! One generic [`AuthenticatorService`] implements the lifecycle
//! (create, retrieve, init, touch, update, renew, discard); the four kinds
//! only differ in the [`Transport`] that moves the authenticator between
//! server and client:
//!
//! | kind    | transport               | artifact                         | storage        |
//! |---------|-------------------------|----------------------------------|----------------|
//! | cookie  | [`CookieTransport`]      | cookie with the signed id         | repository     |
//! | session | [`SessionTransport`]     | signed, encoded authenticator     | self-contained |
//! | bearer  | [`BearerTokenTransport`] | id in a header                    | repository     |
//! | JWT     | [`JwtTransport`]         | signed JWT                        | self-contained, optional repository |

mod bearer;
mod cookie;
mod encoder;
mod fingerprint;
mod jwt;
mod repository;
mod service;
mod session;
mod transport;

pub use bearer::{BearerTokenSettings, BearerTokenTransport};
pub use cookie::CookieTransport;
pub use encoder::{AuthenticatorEncoder, Base64AuthenticatorEncoder, CrypterAuthenticatorEncoder};
pub use fingerprint::{DefaultFingerprintGenerator, FingerprintGenerator};
pub use jwt::{JwtSettings, JwtTransport};
pub use repository::{AuthenticatorRepository, InMemoryAuthenticatorRepository};
pub use service::{AuthenticatorService, AuthenticatorServiceBuilder};
pub use session::SessionTransport;
pub use transport::{extract_from_request, Decoded, RequestPart, Transport};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::login::LoginInfo;

pub type CookieAuthenticatorService = AuthenticatorService<CookieTransport>;
pub type SessionAuthenticatorService = AuthenticatorService<SessionTransport>;
pub type BearerTokenAuthenticatorService = AuthenticatorService<BearerTokenTransport>;
pub type JwtAuthenticatorService = AuthenticatorService<JwtTransport>;

/// A server-issued, session-tracking token bound to a login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticator {
    pub id: String,
    pub login_info: LoginInfo,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, rename = "idleTimeoutMillis", with = "optional_millis")]
    pub idle_timeout: Option<Duration>,
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Extra claims carried by JWT authenticators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_claims: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Authenticator {
    /// `now < expires_at` and, when an idle timeout is set, `now - last_used_at < idle_timeout`.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && !self.is_timed_out(now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        self.idle_timeout
            .map(|idle_timeout| now - self.last_used_at >= idle_timeout)
            .unwrap_or(false)
    }
}

/// Outcome of [`AuthenticatorService::touch`].
///
/// Only a `Touched` authenticator has to be written back with `update`.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchResult {
    Touched(Authenticator),
    Untouched(Authenticator),
}

impl TouchResult {
    pub fn is_touched(&self) -> bool {
        matches!(self, TouchResult::Touched(_))
    }

    pub fn authenticator(&self) -> &Authenticator {
        match self {
            TouchResult::Touched(a) | TouchResult::Untouched(a) => a,
        }
    }

    pub fn into_authenticator(self) -> Authenticator {
        match self {
            TouchResult::Touched(a) | TouchResult::Untouched(a) => a,
        }
    }
}

/// Lifecycle settings shared by every authenticator kind.
#[derive(Debug, Clone)]
pub struct AuthenticatorSettings {
    /// Absolute lifetime of an authenticator.
    pub expiry: Duration,
    /// Maximum time between two requests; `None` disables touching.
    pub idle_timeout: Option<Duration>,
    /// Bind cookie and session authenticators to the client that created them.
    pub use_fingerprinting: bool,
}

impl Default for AuthenticatorSettings {
    fn default() -> Self {
        Self {
            expiry: Duration::hours(12),
            idle_timeout: None,
            use_fingerprinting: true,
        }
    }
}

mod optional_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        value.map(|d| d.num_milliseconds()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<i64>::deserialize(deserializer)?.map(Duration::milliseconds))
    }
}
