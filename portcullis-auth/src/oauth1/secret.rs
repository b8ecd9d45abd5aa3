use std::sync::Arc;

use chrono::Duration;
use serde::Deserialize;

use crate::auth_info::OAuth1Info;
use crate::crypto::{constant_time_eq, Crypter, Signer};
use crate::error::{authentication_error, AuthenticationErrorKind, Error, ErrorKind};
use crate::http::{CookieSettings, IncomingRequest, OutgoingResponse};

#[derive(Deserialize)]
struct TokenSecret {
    token: String,
    secret: String,
}

/// Keeps the request token secret on the client between the redirect and the callback.
///
/// The secret travels encrypted, then signed, in a cookie together with the
/// token it belongs to, so a cookie from another flow is rejected.
pub struct CookieSecretProvider {
    cookie: CookieSettings,
    signer: Arc<dyn Signer>,
    crypter: Arc<dyn Crypter>,
}

impl CookieSecretProvider {
    pub const DEFAULT_COOKIE_NAME: &'static str = "OAuth1TokenSecret";

    pub fn new(cookie: CookieSettings, signer: Arc<dyn Signer>, crypter: Arc<dyn Crypter>) -> Self {
        Self {
            cookie,
            signer,
            crypter,
        }
    }

    /// `OAuth1TokenSecret` cookie that lives for 5 minutes.
    pub fn default_cookie() -> CookieSettings {
        CookieSettings::named(Self::DEFAULT_COOKIE_NAME).with_max_age(Duration::minutes(5))
    }

    /// Fails with `Crypto(EncryptionFailed)` when the payload cannot be encrypted.
    pub fn publish(
        &self,
        response: OutgoingResponse,
        request_token: &OAuth1Info,
    ) -> Result<OutgoingResponse, Error> {
        let json = serde_json::json!({
            "token": request_token.token,
            "secret": request_token.secret,
        });
        let value = self.signer.sign(&self.crypter.encrypt(&json.to_string())?);
        Ok(response.with_cookie(self.cookie.cookie(value)))
    }

    /// The secret published for `token`.
    pub fn retrieve(&self, request: &IncomingRequest, token: &str) -> Result<String, Error> {
        let generic = |message: &str| authentication_error(AuthenticationErrorKind::Generic, message);

        let cookie = request.cookie(&self.cookie.name).ok_or_else(|| {
            generic(&format!("Cookie {} with the token secret is missing", self.cookie.name))
        })?;

        let stored: TokenSecret = self
            .signer
            .extract(cookie)
            .and_then(|encrypted| self.crypter.decrypt(&encrypted))
            .and_then(|json| serde_json::from_str(&json).map_err(Error::from))
            .map_err(|e| e.into_kind(ErrorKind::Authentication(AuthenticationErrorKind::Generic)))?;

        if !constant_time_eq(&stored.token, token) {
            return Err(generic("Token secret cookie belongs to another request token"));
        }
        Ok(stored.secret)
    }

    pub fn discard(&self, response: OutgoingResponse) -> OutgoingResponse {
        response.discarding_cookie(self.cookie.discarding())
    }
}
