//! Generic OAuth1 (RFC 5849) provider.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::secret::CookieSecretProvider;
use super::signature::{self, SIGNATURE_METHOD, VERSION};
use crate::auth_info::OAuth1Info;
use crate::error::{authentication_error, AuthenticationErrorKind, Error, ErrorKind};
use crate::http::{HttpClient, IncomingRequest, OutgoingResponse};
use crate::oauth2::SocialState;
use crate::provider::{CommonSocialProfile, ProfileParser, ProviderResult, SocialProvider};
use crate::util::{Clock, IdGenerator, SecureRandomIdGenerator, SystemClock};

const PROFILE_RETRIEVAL: ErrorKind =
    ErrorKind::Authentication(AuthenticationErrorKind::ProfileRetrieval);

/// Endpoints and consumer credentials of one OAuth1 provider.
#[derive(Debug, Clone)]
pub struct OAuth1Settings {
    pub provider_id: String,
    pub request_token_url: String,
    pub authorization_url: String,
    pub access_token_url: String,
    /// Callback URL; a root-relative URL is resolved against the current request.
    pub callback_url: String,
    pub api_url: Option<String>,
    pub consumer_key: String,
    pub consumer_secret: SecretString,
}

/// Authenticates users with the three-legged OAuth1 flow.
///
/// Without an `oauth_verifier` the provider fetches a request token and
/// redirects to the authorization URL; with one it trades the request token
/// for an [`OAuth1Info`].
#[derive(Clone)]
pub struct OAuth1Provider {
    settings: OAuth1Settings,
    http_client: HttpClient,
    secret_provider: Arc<CookieSecretProvider>,
    profile_parser: Arc<dyn ProfileParser>,
    clock: Arc<dyn Clock>,
    nonce_generator: Arc<dyn IdGenerator>,
}

impl OAuth1Provider {
    pub fn new(
        settings: OAuth1Settings,
        http_client: HttpClient,
        secret_provider: Arc<CookieSecretProvider>,
        profile_parser: Arc<dyn ProfileParser>,
    ) -> Self {
        Self {
            settings,
            http_client,
            secret_provider,
            profile_parser,
            clock: Arc::new(SystemClock),
            nonce_generator: Arc::new(SecureRandomIdGenerator::new(16)),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_nonce_generator(mut self, nonce_generator: Arc<dyn IdGenerator>) -> Self {
        self.nonce_generator = nonce_generator;
        self
    }

    pub fn settings(&self) -> &OAuth1Settings {
        &self.settings
    }

    /// Value of the `Authorization` header for a signed request.
    ///
    /// `token` is the (request or access) token with its secret; `extra` are
    /// further `oauth_*` protocol parameters.
    async fn authorization(
        &self,
        method: &str,
        url: &Url,
        token: Option<(&str, &str)>,
        extra: &[(&str, &str)],
    ) -> Result<String, Error> {
        let mut params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.settings.consumer_key.clone()),
            ("oauth_nonce".to_string(), self.nonce_generator.generate().await?),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), self.clock.now().timestamp().to_string()),
            ("oauth_version".to_string(), VERSION.to_string()),
        ];
        if let Some((token, _)) = token {
            params.push(("oauth_token".to_string(), token.to_string()));
        }
        params.extend(
            extra
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );

        let base_string = signature::base_string(method, url, &params);
        let signature = signature::sign(
            &base_string,
            self.settings.consumer_secret.expose_secret(),
            token.map(|(_, secret)| secret),
        );
        params.push(("oauth_signature".to_string(), signature));

        Ok(signature::authorization_header(&params))
    }

    /// POSTs a signed token request and reads `oauth_token` / `oauth_token_secret`
    /// from the form-encoded answer.
    async fn token_request(
        &self,
        endpoint: &str,
        token: Option<(&str, &str)>,
        extra: &[(&str, &str)],
    ) -> Result<OAuth1Info, Error> {
        let url = parse_url(endpoint)?;
        let authorization = self.authorization("POST", &url, token, extra).await?;

        let response = self
            .http_client
            .post(url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(
                "{} token endpoint answered {}: {}",
                self.settings.provider_id, status, body
            );
            return Err(authentication_error(
                AuthenticationErrorKind::UnexpectedResponse,
                &format!("Token endpoint answered {}", status),
            ));
        }

        let mut token = None;
        let mut secret = None;
        for (name, value) in url::form_urlencoded::parse(body.as_bytes()) {
            match name.as_ref() {
                "oauth_token" => token = Some(value.into_owned()),
                "oauth_token_secret" => secret = Some(value.into_owned()),
                _ => {}
            }
        }

        match (token, secret) {
            (Some(token), Some(secret)) => Ok(OAuth1Info { token, secret }),
            _ => Err(authentication_error(
                AuthenticationErrorKind::UnexpectedResponse,
                "Token response has no oauth_token or oauth_token_secret",
            )),
        }
    }

    fn authorization_redirect(&self, request_token: &OAuth1Info) -> Result<String, Error> {
        let mut url = parse_url(&self.settings.authorization_url)?;
        url.query_pairs_mut()
            .append_pair("oauth_token", &request_token.token);
        Ok(url.into())
    }
}

fn parse_url(url: &str) -> Result<Url, Error> {
    Url::parse(url).map_err(|e| {
        authentication_error(
            AuthenticationErrorKind::Generic,
            &format!("Invalid URL {}: {}", url, e),
        )
    })
}

#[async_trait]
impl SocialProvider for OAuth1Provider {
    type Info = OAuth1Info;

    fn id(&self) -> &str {
        &self.settings.provider_id
    }

    async fn authenticate(
        &self,
        request: &IncomingRequest,
    ) -> Result<ProviderResult<OAuth1Info>, Error> {
        if request.query_param("denied").is_some() {
            return Err(authentication_error(
                AuthenticationErrorKind::AccessDenied,
                &format!("{} denied access", self.settings.provider_id),
            ));
        }

        match request.query_param("oauth_verifier") {
            Some(verifier) => {
                let token = request.query_param("oauth_token").ok_or_else(|| {
                    authentication_error(
                        AuthenticationErrorKind::UnexpectedResponse,
                        "Callback has an oauth_verifier but no oauth_token",
                    )
                })?;
                let secret = self.secret_provider.retrieve(request, token)?;
                debug!("Exchanging {} request token", self.settings.provider_id);

                let auth_info = self
                    .token_request(
                        &self.settings.access_token_url,
                        Some((token, secret.as_str())),
                        &[("oauth_verifier", verifier)],
                    )
                    .await?;
                Ok(ProviderResult::Authenticated {
                    auth_info,
                    state: SocialState::new(),
                })
            }
            None => {
                let callback = request.absolute_url(&self.settings.callback_url);
                let request_token = self
                    .token_request(
                        &self.settings.request_token_url,
                        None,
                        &[("oauth_callback", callback.as_str())],
                    )
                    .await?;
                let url = self.authorization_redirect(&request_token)?;
                debug!("Redirecting to {} for authorization", self.settings.provider_id);

                let response = OutgoingResponse::redirect(&url);
                Ok(ProviderResult::Redirect(
                    self.secret_provider.publish(response, &request_token)?,
                ))
            }
        }
    }

    async fn retrieve_profile(&self, auth_info: &OAuth1Info) -> Result<CommonSocialProfile, Error> {
        let api_url = self.settings.api_url.as_deref().ok_or_else(|| {
            authentication_error(
                AuthenticationErrorKind::ProfileRetrieval,
                &format!("No profile API URL configured for {}", self.settings.provider_id),
            )
        })?;
        let url = parse_url(api_url)?;
        let token = (auth_info.token.as_str(), auth_info.secret.as_str());
        let authorization = self.authorization("GET", &url, Some(token), &[]).await?;

        let response = self
            .http_client
            .get(url)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::from(e).into_kind(PROFILE_RETRIEVAL))?;

        let status = response.status();
        if !status.is_success() {
            return Err(authentication_error(
                AuthenticationErrorKind::ProfileRetrieval,
                &format!("{} profile endpoint answered {}", self.settings.provider_id, status),
            ));
        }

        let content: Value = response
            .json()
            .await
            .map_err(|e| Error::from(e).into_kind(PROFILE_RETRIEVAL))?;
        self.profile_parser.parse(&self.settings.provider_id, &content)
    }
}
