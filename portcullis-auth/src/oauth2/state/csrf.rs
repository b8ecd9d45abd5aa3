use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use super::{Publishable, StateItem, StateItemHandler};
use crate::crypto::{constant_time_eq, Signer};
use crate::error::{state_error, Error, ErrorKind, OAuth2StateErrorKind};
use crate::http::{CookieSettings, IncomingRequest, OutgoingResponse};
use crate::util::IdGenerator;

const TOKEN_KEY: &str = "token";

/// Protects the OAuth2 flow against CSRF.
///
/// A random token goes into the state and, signed, into a short-lived
/// cookie. On callback both must carry the same token.
pub struct CsrfStateItemHandler {
    cookie: CookieSettings,
    id_generator: Arc<dyn IdGenerator>,
    signer: Arc<dyn Signer>,
}

impl CsrfStateItemHandler {
    pub const ID: &'static str = "csrf-state";
    pub const DEFAULT_COOKIE_NAME: &'static str = "OAuth2State";

    pub fn new(
        cookie: CookieSettings,
        id_generator: Arc<dyn IdGenerator>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        Self {
            cookie,
            id_generator,
            signer,
        }
    }

    /// `OAuth2State` cookie that lives for 5 minutes.
    pub fn default_cookie() -> CookieSettings {
        CookieSettings::named(Self::DEFAULT_COOKIE_NAME).with_max_age(Duration::minutes(5))
    }
}

#[async_trait]
impl StateItemHandler for CsrfStateItemHandler {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn state(&self) -> Result<StateItem, Error> {
        let token = self.id_generator.generate().await?;
        Ok(StateItem::from([(TOKEN_KEY.to_string(), token)]))
    }

    async fn validate(&self, item: &StateItem, request: &IncomingRequest) -> Result<bool, Error> {
        let cookie = request.cookie(&self.cookie.name).ok_or_else(|| {
            state_error(
                OAuth2StateErrorKind::ClientStateDoesNotExist,
                &format!("Cookie {} with the CSRF token is missing", self.cookie.name),
            )
        })?;
        let client_token = self
            .signer
            .extract(cookie)
            .map_err(|e| e.into_kind(ErrorKind::OAuth2State(OAuth2StateErrorKind::InvalidSignature)))?;

        Ok(item
            .get(TOKEN_KEY)
            .map(|token| constant_time_eq(token, &client_token))
            .unwrap_or(false))
    }

    fn publishable(&self) -> Option<&dyn Publishable> {
        Some(self as &dyn Publishable)
    }
}

impl Publishable for CsrfStateItemHandler {
    fn publish(&self, item: &StateItem, response: OutgoingResponse) -> OutgoingResponse {
        match item.get(TOKEN_KEY) {
            Some(token) => response.with_cookie(self.cookie.cookie(self.signer.sign(token))),
            None => response,
        }
    }
}
