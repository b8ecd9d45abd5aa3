//! Cookie authenticators: a signed id in a cookie, the authenticator in a repository.

use std::sync::Arc;

use super::{Authenticator, AuthenticatorSettings, Decoded, Transport};
use crate::crypto::Signer;
use crate::error::Error;
use crate::http::{Cookie, CookieSettings, IncomingRequest, OutgoingResponse};

pub struct CookieTransport {
    settings: CookieSettings,
    signer: Arc<dyn Signer>,
}

impl CookieTransport {
    /// Default cookie name.
    pub const DEFAULT_NAME: &'static str = "id";

    pub fn new(settings: CookieSettings, signer: Arc<dyn Signer>) -> Self {
        Self { settings, signer }
    }

    pub fn with_defaults(signer: Arc<dyn Signer>) -> Self {
        Self::new(CookieSettings::named(Self::DEFAULT_NAME), signer)
    }

    pub fn cookie_settings(&self) -> &CookieSettings {
        &self.settings
    }
}

impl Transport for CookieTransport {
    type Artifact = Cookie;

    fn kind(&self) -> &'static str {
        "cookie"
    }

    fn is_self_contained(&self) -> bool {
        false
    }

    fn supports_fingerprinting(&self) -> bool {
        true
    }

    fn extract(&self, request: &IncomingRequest) -> Option<String> {
        request.cookie(&self.settings.name).map(str::to_string)
    }

    fn decode(&self, raw: &str, _settings: &AuthenticatorSettings) -> Result<Decoded, Error> {
        self.signer.extract(raw).map(Decoded::Reference)
    }

    fn encode(&self, authenticator: &Authenticator) -> Result<Cookie, Error> {
        Ok(self.settings.cookie(self.signer.sign(&authenticator.id)))
    }

    fn embed(&self, artifact: Cookie, response: OutgoingResponse) -> OutgoingResponse {
        response.with_cookie(artifact)
    }

    fn embed_into_request(&self, artifact: Cookie, request: IncomingRequest) -> IncomingRequest {
        request.with_cookie(artifact.name, artifact.value)
    }

    fn discard(&self, response: OutgoingResponse) -> OutgoingResponse {
        response.discarding_cookie(self.settings.discarding())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::{AuthenticatorService, InMemoryAuthenticatorRepository};
    use crate::crypto::{HmacSigner, HmacSignerSettings};
    use crate::error::{AuthenticatorErrorKind, ErrorKind};
    use crate::login::LoginInfo;
    use crate::util::FixedClock;
    use chrono::{TimeZone, Utc};
    use reqwest::header::{HeaderValue, USER_AGENT};
    use secrecy::SecretString;

    fn signer() -> Arc<dyn Signer> {
        Arc::new(HmacSigner::new(HmacSignerSettings::new(SecretString::from(
            "cookie-signing-key".to_string(),
        ))))
    }

    fn service(
        repository: Arc<InMemoryAuthenticatorRepository>,
    ) -> AuthenticatorService<CookieTransport> {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        AuthenticatorService::builder(CookieTransport::with_defaults(signer()))
            .with_repository(repository)
            .with_clock(Arc::new(clock))
            .build()
    }

    fn browser(agent: &'static str) -> IncomingRequest {
        IncomingRequest::new().with_header(USER_AGENT, HeaderValue::from_static(agent))
    }

    #[tokio::test]
    async fn test_init_stores_and_signs_the_id() {
        let repository = Arc::new(InMemoryAuthenticatorRepository::new());
        let service = service(repository.clone());
        let authenticator = service
            .create(LoginInfo::new("credentials", "jane@example.com"), &browser("firefox"))
            .await
            .unwrap();

        let cookie = service.init(authenticator.clone()).await.unwrap();
        assert_eq!(cookie.name, "id");
        assert_ne!(cookie.value, authenticator.id);
        assert!(cookie.value.ends_with(&authenticator.id));
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_round_trip() {
        let repository = Arc::new(InMemoryAuthenticatorRepository::new());
        let service = service(repository);
        let request = browser("firefox");
        let authenticator = service
            .create(LoginInfo::new("credentials", "jane@example.com"), &request)
            .await
            .unwrap();
        let cookie = service.init(authenticator.clone()).await.unwrap();

        let request = service.embed_into_request(cookie, request);
        assert_eq!(service.retrieve(&request).await.unwrap(), Some(authenticator));
    }

    #[tokio::test]
    async fn test_tampered_cookie_fails_retrieval() {
        let service = service(Arc::new(InMemoryAuthenticatorRepository::new()));
        let request = browser("firefox").with_cookie("id", "1-00ff-forged");

        let result = service.retrieve(&request).await;
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Authenticator(AuthenticatorErrorKind::Retrieval),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_unknown_id_is_absent() {
        let service = service(Arc::new(InMemoryAuthenticatorRepository::new()));
        let request = browser("firefox").with_cookie("id", signer().sign("unknown"));

        assert_eq!(service.retrieve(&request).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cookie_from_other_client_is_absent() {
        let service = service(Arc::new(InMemoryAuthenticatorRepository::new()));
        let authenticator = service
            .create(LoginInfo::new("credentials", "jane@example.com"), &browser("firefox"))
            .await
            .unwrap();
        let cookie = service.init(authenticator).await.unwrap();

        let stolen = service.embed_into_request(cookie, browser("curl"));
        assert_eq!(service.retrieve(&stolen).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_discard_removes_and_expires_cookie() {
        let repository = Arc::new(InMemoryAuthenticatorRepository::new());
        let service = service(repository.clone());
        let authenticator = service
            .create(LoginInfo::new("credentials", "jane@example.com"), &browser("firefox"))
            .await
            .unwrap();
        let cookie = service.init(authenticator.clone()).await.unwrap();
        let response = service.embed(cookie, OutgoingResponse::ok());

        let response = service.discard(authenticator, response).await.unwrap();
        assert!(repository.is_empty());
        assert!(response.cookie("id").is_none());
        assert_eq!(response.discarding_cookies()[0].name, "id");
    }

    #[tokio::test]
    async fn test_missing_repository_fails_init() {
        let service = AuthenticatorService::builder(CookieTransport::with_defaults(signer())).build();
        let authenticator = service
            .create(LoginInfo::new("credentials", "jane@example.com"), &browser("firefox"))
            .await
            .unwrap();

        let result = service.init(authenticator).await;
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Authenticator(AuthenticatorErrorKind::Initialization),
                ..
            })
        ));
    }
}
