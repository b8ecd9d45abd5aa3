//! Bearer token authenticators: the id travels as a token, the authenticator
//! lives in a repository.

use reqwest::header::{HeaderName, HeaderValue};
use tracing::warn;

use super::{
    extract_from_request, Authenticator, AuthenticatorSettings, Decoded, RequestPart, Transport,
};
use crate::error::Error;
use crate::http::{IncomingRequest, OutgoingResponse};

#[derive(Debug, Clone)]
pub struct BearerTokenSettings {
    /// Header (or query parameter, cookie, session key) carrying the token.
    pub field_name: String,
    /// Where to look for the token, in order.
    pub request_parts: Vec<RequestPart>,
}

impl Default for BearerTokenSettings {
    fn default() -> Self {
        Self {
            field_name: "X-Auth-Token".to_string(),
            request_parts: vec![RequestPart::Headers],
        }
    }
}

pub struct BearerTokenTransport {
    settings: BearerTokenSettings,
}

impl BearerTokenTransport {
    pub fn new(settings: BearerTokenSettings) -> Self {
        Self { settings }
    }
}

impl Default for BearerTokenTransport {
    fn default() -> Self {
        Self::new(BearerTokenSettings::default())
    }
}

impl Transport for BearerTokenTransport {
    type Artifact = String;

    fn kind(&self) -> &'static str {
        "bearer token"
    }

    fn is_self_contained(&self) -> bool {
        false
    }

    fn extract(&self, request: &IncomingRequest) -> Option<String> {
        extract_from_request(request, &self.settings.field_name, &self.settings.request_parts)
    }

    fn decode(&self, raw: &str, _settings: &AuthenticatorSettings) -> Result<Decoded, Error> {
        Ok(Decoded::Reference(raw.to_string()))
    }

    fn encode(&self, authenticator: &Authenticator) -> Result<String, Error> {
        Ok(authenticator.id.clone())
    }

    fn embed(&self, artifact: String, response: OutgoingResponse) -> OutgoingResponse {
        match token_header(&self.settings.field_name, &artifact) {
            Some((name, value)) => response.with_header(name, value),
            None => response,
        }
    }

    fn embed_into_request(&self, artifact: String, request: IncomingRequest) -> IncomingRequest {
        match token_header(&self.settings.field_name, &artifact) {
            Some((name, value)) => request.with_header(name, value),
            None => request,
        }
    }

    fn discard(&self, response: OutgoingResponse) -> OutgoingResponse {
        response.without_header(&self.settings.field_name)
    }
}

/// Header name and value for a token, `None` if either is not a valid header part.
pub(super) fn token_header(field_name: &str, token: &str) -> Option<(HeaderName, HeaderValue)> {
    match (
        HeaderName::from_bytes(field_name.as_bytes()),
        HeaderValue::from_str(token),
    ) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            warn!("Cannot put a token into the {} header", field_name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::{
        AuthenticatorRepository, AuthenticatorService, InMemoryAuthenticatorRepository,
    };
    use crate::error::{AuthenticatorErrorKind, ErrorKind};
    use crate::login::LoginInfo;
    use crate::util::{Clock, FixedClock};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn service(
        repository: Arc<InMemoryAuthenticatorRepository>,
        clock: Arc<FixedClock>,
    ) -> AuthenticatorService<BearerTokenTransport> {
        AuthenticatorService::builder(BearerTokenTransport::default())
            .with_repository(repository)
            .with_clock(clock)
            .build()
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_token_in_response_header() {
        let service = service(Arc::new(InMemoryAuthenticatorRepository::new()), clock());
        let authenticator = service
            .create(LoginInfo::new("credentials", "jane@example.com"), &IncomingRequest::new())
            .await
            .unwrap();
        let token = service.init(authenticator.clone()).await.unwrap();

        let response = service.embed(token, OutgoingResponse::ok());
        assert_eq!(response.header("X-Auth-Token"), Some(authenticator.id.as_str()));

        let response = service.discard(authenticator, response).await.unwrap();
        assert_eq!(response.header("X-Auth-Token"), None);
    }

    #[tokio::test]
    async fn test_token_from_query_string_when_configured() {
        let repository = Arc::new(InMemoryAuthenticatorRepository::new());
        let service = AuthenticatorService::builder(BearerTokenTransport::new(BearerTokenSettings {
            field_name: "token".to_string(),
            request_parts: vec![RequestPart::Headers, RequestPart::QueryString],
        }))
        .with_repository(repository)
        .build();
        let authenticator = service
            .create(LoginInfo::new("credentials", "jane@example.com"), &IncomingRequest::new())
            .await
            .unwrap();
        let token = service.init(authenticator.clone()).await.unwrap();

        let request = IncomingRequest::new().with_query_param("token", token);
        assert_eq!(service.retrieve(&request).await.unwrap(), Some(authenticator));
    }

    #[tokio::test]
    async fn test_create_sets_expiry_from_clock() {
        let clock = clock();
        let service = service(Arc::new(InMemoryAuthenticatorRepository::new()), clock.clone());

        let authenticator = service
            .create(LoginInfo::new("facebook", "123"), &IncomingRequest::new())
            .await
            .unwrap();

        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(authenticator.last_used_at, t);
        assert_eq!(authenticator.expires_at, t + Duration::hours(12));
        assert_eq!(authenticator.login_info, LoginInfo::new("facebook", "123"));
        assert_eq!(authenticator.fingerprint, None);
        assert!(service.is_valid(&authenticator));

        clock.advance(Duration::hours(12));
        assert!(!service.is_valid(&authenticator));
    }

    #[tokio::test]
    async fn test_renew_replaces_id() {
        let clock = clock();
        let repository = Arc::new(InMemoryAuthenticatorRepository::new());
        let service = service(repository.clone(), clock.clone());
        let old = service
            .create(LoginInfo::new("facebook", "123"), &IncomingRequest::new())
            .await
            .unwrap();
        let token = service.init(old.clone()).await.unwrap();

        clock.advance(Duration::hours(1));
        let response = service.renew(old.clone(), OutgoingResponse::ok()).await.unwrap();
        let new_token = response.header("X-Auth-Token").unwrap().to_string();
        assert_ne!(new_token, token);

        let old_request = service.embed_into_request(token, IncomingRequest::new());
        assert_eq!(service.retrieve(&old_request).await.unwrap(), None);

        let new_request = service.embed_into_request(new_token, IncomingRequest::new());
        let renewed = service.retrieve(&new_request).await.unwrap().unwrap();
        assert_eq!(renewed.login_info, old.login_info);
        assert_eq!(renewed.expires_at, clock.now() + Duration::hours(12));
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_renew_of_removed_authenticator_fails() {
        let repository = Arc::new(InMemoryAuthenticatorRepository::new());
        let service = service(repository.clone(), clock());
        let old = service
            .create(LoginInfo::new("facebook", "123"), &IncomingRequest::new())
            .await
            .unwrap();
        service.init(old.clone()).await.unwrap();
        repository.remove(&old.id).await.unwrap();

        let result = service.renew(old, OutgoingResponse::ok()).await;
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Authenticator(AuthenticatorErrorKind::Renewal),
                ..
            })
        ));
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_renews_issue_one_authenticator() {
        let repository = Arc::new(InMemoryAuthenticatorRepository::new());
        let service = Arc::new(service(repository.clone(), clock()));
        let old = service
            .create(LoginInfo::new("facebook", "123"), &IncomingRequest::new())
            .await
            .unwrap();
        service.init(old.clone()).await.unwrap();

        let first = tokio::spawn({
            let service = service.clone();
            let old = old.clone();
            async move { service.renew_artifact(old).await }
        });
        let second = tokio::spawn({
            let service = service.clone();
            let old = old.clone();
            async move { service.renew_artifact(old).await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(repository.len(), 1);
    }
}
