//! Provider abstractions shared by the OAuth1, OAuth2 and password providers.

mod profile;

pub use profile::{CommonSocialProfile, JsonPointerProfileParser, ProfileParser};

use async_trait::async_trait;

use crate::auth_info::AuthInfo;
use crate::error::Error;
use crate::http::{IncomingRequest, OutgoingResponse};
use crate::login::LoginInfo;
use crate::oauth2::SocialState;

/// Outcome of one step of a redirect-based (social) flow.
#[derive(Debug)]
pub enum ProviderResult<A: AuthInfo> {
    /// Send the user to the provider.
    Redirect(OutgoingResponse),
    /// The provider called back successfully.
    ///
    /// `state` is empty for OAuth1, which has no state parameter.
    Authenticated { auth_info: A, state: SocialState },
}

/// A provider that authenticates users by sending them to a third party.
#[async_trait]
pub trait SocialProvider: Send + Sync {
    type Info: AuthInfo;

    /// Provider id, used as `LoginInfo::provider_id`.
    fn id(&self) -> &str;

    /// Starts the flow (redirect) or completes it (callback).
    async fn authenticate(
        &self,
        request: &IncomingRequest,
    ) -> Result<ProviderResult<Self::Info>, Error>;

    async fn retrieve_profile(&self, auth_info: &Self::Info) -> Result<CommonSocialProfile, Error>;
}

/// A provider that authenticates from data already in the request
/// (e.g. an `Authorization: Basic` header), without a dedicated login step.
#[async_trait]
pub trait RequestProvider: Send + Sync {
    fn id(&self) -> &str;

    /// `Ok(None)` when the request does not carry usable credentials.
    async fn authenticate(&self, request: &IncomingRequest) -> Result<Option<LoginInfo>, Error>;
}
