//! Generic OAuth2 provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::state::{SocialStateProvider, StateItem, UserStateItemHandler};
use crate::auth_info::OAuth2Info;
use crate::error::{authentication_error, AuthenticationErrorKind, Error, ErrorKind};
use crate::http::{HttpClient, IncomingRequest, OutgoingResponse};
use crate::provider::{CommonSocialProfile, ProfileParser, ProviderResult, SocialProvider};

const PROFILE_RETRIEVAL: ErrorKind =
    ErrorKind::Authentication(AuthenticationErrorKind::ProfileRetrieval);

/// Endpoints and client credentials of one OAuth2 provider.
#[derive(Debug, Clone)]
pub struct OAuth2Settings {
    /// Becomes `LoginInfo::provider_id` (`google`, `github`, ...).
    pub provider_id: String,
    pub authorization_url: Option<String>,
    pub access_token_url: String,
    /// Callback URL; a root-relative URL is resolved against the current request.
    pub redirect_url: Option<String>,
    /// Profile endpoint, called with the access token as bearer token.
    pub api_url: Option<String>,
    pub client_id: String,
    pub client_secret: SecretString,
    pub scope: Option<String>,
    /// Extra query parameters for the authorization URL.
    pub authorization_params: BTreeMap<String, String>,
    /// Extra form parameters for the access token request.
    pub access_token_params: BTreeMap<String, String>,
}

/// Authenticates users with the OAuth2 authorization-code flow.
///
/// Without a `code` the provider redirects to the authorization URL with a
/// freshly built state; with a `code` it validates the state that came back
/// and exchanges the code for an [`OAuth2Info`].
#[derive(Clone)]
pub struct OAuth2Provider {
    settings: OAuth2Settings,
    http_client: HttpClient,
    state_provider: SocialStateProvider,
    profile_parser: Arc<dyn ProfileParser>,
}

impl OAuth2Provider {
    pub fn new(
        settings: OAuth2Settings,
        http_client: HttpClient,
        state_provider: SocialStateProvider,
        profile_parser: Arc<dyn ProfileParser>,
    ) -> Self {
        Self {
            settings,
            http_client,
            state_provider,
            profile_parser,
        }
    }

    pub fn settings(&self) -> &OAuth2Settings {
        &self.settings
    }

    /// A provider that additionally carries `item` through the flow.
    ///
    /// The item comes back in the `state` of [`ProviderResult::Authenticated`].
    pub fn with_user_state(&self, item: StateItem) -> Self {
        Self {
            state_provider: self
                .state_provider
                .with_handler(Arc::new(UserStateItemHandler::new(item))),
            ..self.clone()
        }
    }

    /// Exchanges a refresh token for new tokens.
    ///
    /// Providers that do not rotate refresh tokens omit it from the response;
    /// the old one is kept in that case.
    pub async fn refresh(&self, refresh_token: &str) -> Result<OAuth2Info, Error> {
        let params = BTreeMap::from([
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.expose_secret().as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);

        let mut info = self.request_tokens(&params).await?;
        if info.refresh_token.is_none() {
            info.refresh_token = Some(refresh_token.to_string());
        }
        Ok(info)
    }

    fn authorization_redirect(&self, request: &IncomingRequest, state: &str) -> Result<String, Error> {
        let authorization_url = self.settings.authorization_url.as_deref().ok_or_else(|| {
            authentication_error(
                AuthenticationErrorKind::Generic,
                &format!("No authorization URL configured for {}", self.settings.provider_id),
            )
        })?;
        let mut url = Url::parse(authorization_url).map_err(|e| {
            authentication_error(
                AuthenticationErrorKind::Generic,
                &format!("Invalid authorization URL {}: {}", authorization_url, e),
            )
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.settings.client_id);
            if let Some(redirect_url) = &self.settings.redirect_url {
                query.append_pair("redirect_uri", &request.absolute_url(redirect_url));
            }
            query.append_pair("response_type", "code");
            if let Some(scope) = &self.settings.scope {
                query.append_pair("scope", scope);
            }
            query.append_pair("state", state);
            for (name, value) in &self.settings.authorization_params {
                query.append_pair(name, value);
            }
        }

        Ok(url.into())
    }

    async fn access_token(&self, code: &str, request: &IncomingRequest) -> Result<OAuth2Info, Error> {
        let redirect_uri = self
            .settings
            .redirect_url
            .as_ref()
            .map(|url| request.absolute_url(url));

        let mut params = BTreeMap::from([
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.expose_secret().as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
        ]);
        if let Some(redirect_uri) = &redirect_uri {
            params.insert("redirect_uri", redirect_uri);
        }
        for (name, value) in &self.settings.access_token_params {
            params.insert(name, value);
        }

        self.request_tokens(&params).await
    }

    async fn request_tokens(&self, params: &BTreeMap<&str, &str>) -> Result<OAuth2Info, Error> {
        let response = self
            .http_client
            .post(&self.settings.access_token_url)
            .header(ACCEPT, "application/json")
            .form(params)
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

        parse_token_response(&body)
    }
}

/// Reads `access_token`, `token_type`, `expires_in` and `refresh_token`;
/// every other scalar field ends up in `params`.
fn parse_token_response(body: &str) -> Result<OAuth2Info, Error> {
    let unexpected = |message: &str| {
        authentication_error(AuthenticationErrorKind::UnexpectedResponse, message)
    };

    let json: Value = serde_json::from_str(body).map_err(|e| {
        Error::from(e).into_kind(ErrorKind::Authentication(
            AuthenticationErrorKind::UnexpectedResponse,
        ))
    })?;
    let fields = json
        .as_object()
        .ok_or_else(|| unexpected("Token response is not a JSON object"))?;

    let access_token = fields
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| unexpected("Token response has no access_token"))?
        .to_string();

    // Some providers send expires_in as a string
    let expires_in = match fields.get("expires_in") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };

    let params: BTreeMap<String, String> = fields
        .iter()
        .filter(|(name, _)| {
            !matches!(
                name.as_str(),
                "access_token" | "token_type" | "expires_in" | "refresh_token"
            )
        })
        .filter_map(|(name, value)| match value {
            Value::String(s) => Some((name.clone(), s.clone())),
            Value::Number(n) => Some((name.clone(), n.to_string())),
            Value::Bool(b) => Some((name.clone(), b.to_string())),
            _ => None,
        })
        .collect();

    Ok(OAuth2Info {
        access_token,
        token_type: fields.get("token_type").and_then(Value::as_str).map(str::to_string),
        expires_in,
        refresh_token: fields
            .get("refresh_token")
            .and_then(Value::as_str)
            .map(str::to_string),
        params: (!params.is_empty()).then_some(params),
    })
}

#[async_trait]
impl SocialProvider for OAuth2Provider {
    type Info = OAuth2Info;

    fn id(&self) -> &str {
        &self.settings.provider_id
    }

    async fn authenticate(
        &self,
        request: &IncomingRequest,
    ) -> Result<ProviderResult<OAuth2Info>, Error> {
        if let Some(error) = request.query_param("error") {
            let description = request.query_param("error_description").unwrap_or_default();
            return Err(match error {
                "access_denied" => authentication_error(
                    AuthenticationErrorKind::AccessDenied,
                    &format!("{} denied access: {}", self.settings.provider_id, description),
                ),
                other => authentication_error(
                    AuthenticationErrorKind::UnexpectedResponse,
                    &format!(
                        "{} answered with error {}: {}",
                        self.settings.provider_id, other, description
                    ),
                ),
            });
        }

        match request.query_param("code") {
            Some(code) => {
                let state = self.state_provider.unserialize(request)?;
                self.state_provider.validate(&state, request).await?;
                debug!("Exchanging {} authorization code", self.settings.provider_id);

                let auth_info = self.access_token(code, request).await?;
                Ok(ProviderResult::Authenticated { auth_info, state })
            }
            None => {
                let state = self.state_provider.build(request).await?;
                let url = self.authorization_redirect(request, &self.state_provider.serialize(&state))?;
                debug!("Redirecting to {} for authorization", self.settings.provider_id);

                let response = OutgoingResponse::redirect(&url);
                Ok(ProviderResult::Redirect(
                    self.state_provider.publish(response, &state),
                ))
            }
        }
    }

    async fn retrieve_profile(&self, auth_info: &OAuth2Info) -> Result<CommonSocialProfile, Error> {
        let profile_error = |message: String| {
            authentication_error(AuthenticationErrorKind::ProfileRetrieval, &message)
        };

        let api_url = self.settings.api_url.as_deref().ok_or_else(|| {
            profile_error(format!(
                "No profile API URL configured for {}",
                self.settings.provider_id
            ))
        })?;

        let response = self
            .http_client
            .get(api_url)
            .bearer_auth(&auth_info.access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::from(e).into_kind(PROFILE_RETRIEVAL))?;

        let status = response.status();
        if !status.is_success() {
            return Err(profile_error(format!(
                "{} profile endpoint answered {}",
                self.settings.provider_id, status
            )));
        }

        let content: Value = response
            .json()
            .await
            .map_err(|e| Error::from(e).into_kind(PROFILE_RETRIEVAL))?;
        self.profile_parser.parse(&self.settings.provider_id, &content)
    }
}
