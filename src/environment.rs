use std::sync::Arc;

use events::{AuthEvent, EventPublisher};
use log::*;
use portcullis_auth::authenticator::{Authenticator, AuthenticatorService, Transport};
use portcullis_auth::http::{IncomingRequest, OutgoingResponse};
use portcullis_auth::identity::{Identity, IdentityService};
use portcullis_auth::provider::RequestProvider;
use portcullis_auth::{Error, LoginInfo};
use serde_json::Value;

use crate::handler::{SecuredRequestHandler, UserAwareRequestHandler};

/// Everything a request handler needs to authenticate a request: where
/// identities come from, how authenticators travel, which request providers
/// to try, and who hears about the outcome.
pub struct Environment<I: Identity, T: Transport> {
    identity_service: Arc<dyn IdentityService<I>>,
    authenticator_service: Arc<AuthenticatorService<T>>,
    request_providers: Vec<Arc<dyn RequestProvider>>,
    event_publisher: EventPublisher,
}

impl<I: Identity, T: Transport> Clone for Environment<I, T> {
    fn clone(&self) -> Self {
        Self {
            identity_service: Arc::clone(&self.identity_service),
            authenticator_service: Arc::clone(&self.authenticator_service),
            request_providers: self.request_providers.clone(),
            event_publisher: self.event_publisher.clone(),
        }
    }
}

/// How a request was authenticated, before the handler runs its block.
pub(crate) enum Resolution<I> {
    /// A valid authenticator whose identity exists.
    Stored {
        identity: I,
        authenticator: Authenticator,
    },
    /// A request provider vouched for the request; the authenticator is
    /// created but not yet initialized.
    Provided {
        identity: I,
        authenticator: Authenticator,
    },
    /// An expired or timed-out authenticator, or one whose identity is gone.
    Rejected(Authenticator),
    Anonymous,
}

impl<I: Identity, T: Transport> Environment<I, T> {
    pub fn new(
        identity_service: Arc<dyn IdentityService<I>>,
        authenticator_service: AuthenticatorService<T>,
    ) -> Self {
        Self {
            identity_service,
            authenticator_service: Arc::new(authenticator_service),
            request_providers: Vec::new(),
            event_publisher: EventPublisher::new(),
        }
    }

    /// Adds a provider tried, in registration order, on requests without an authenticator.
    pub fn with_request_provider(mut self, provider: Arc<dyn RequestProvider>) -> Self {
        self.request_providers.push(provider);
        self
    }

    pub fn with_event_publisher(mut self, event_publisher: EventPublisher) -> Self {
        self.event_publisher = event_publisher;
        self
    }

    pub fn identity_service(&self) -> &Arc<dyn IdentityService<I>> {
        &self.identity_service
    }

    pub fn authenticator_service(&self) -> &AuthenticatorService<T> {
        &self.authenticator_service
    }

    pub fn request_providers(&self) -> &[Arc<dyn RequestProvider>] {
        &self.request_providers
    }

    pub fn event_publisher(&self) -> &EventPublisher {
        &self.event_publisher
    }

    pub fn secured(&self) -> SecuredRequestHandler<I, T> {
        SecuredRequestHandler::new(self.clone())
    }

    pub fn user_aware(&self) -> UserAwareRequestHandler<I, T> {
        UserAwareRequestHandler::new(self.clone())
    }

    /// Issues a new authenticator for `login_info` and embeds it into `response`.
    pub async fn login(
        &self,
        login_info: LoginInfo,
        request: &IncomingRequest,
        response: OutgoingResponse,
    ) -> Result<OutgoingResponse, Error> {
        let authenticator = self
            .authenticator_service
            .create(login_info.clone(), request)
            .await?;
        let artifact = self.authenticator_service.init(authenticator).await?;
        let response = self.authenticator_service.embed(artifact, response);

        info!("Logged in {}", login_info);
        self.event_publisher
            .publish(AuthEvent::Login {
                login_info: login_value(&login_info),
                path: request.path().to_string(),
            })
            .await;
        Ok(response)
    }

    /// Announces a newly created identity, then logs it in.
    pub async fn sign_up(
        &self,
        login_info: LoginInfo,
        request: &IncomingRequest,
        response: OutgoingResponse,
    ) -> Result<OutgoingResponse, Error> {
        self.event_publisher
            .publish(AuthEvent::SignUp {
                login_info: login_value(&login_info),
                path: request.path().to_string(),
            })
            .await;
        self.login(login_info, request, response).await
    }

    pub async fn logout(
        &self,
        authenticator: Authenticator,
        request: &IncomingRequest,
        response: OutgoingResponse,
    ) -> Result<OutgoingResponse, Error> {
        let login_info = authenticator.login_info.clone();
        let response = self
            .authenticator_service
            .discard(authenticator, response)
            .await?;

        info!("Logged out {}", login_info);
        self.event_publisher
            .publish(AuthEvent::Logout {
                login_info: login_value(&login_info),
                path: request.path().to_string(),
            })
            .await;
        Ok(response)
    }

    /// Replaces `authenticator` with a new one, e.g. after a privilege change.
    pub async fn renew(
        &self,
        authenticator: Authenticator,
        request: &IncomingRequest,
        response: OutgoingResponse,
    ) -> Result<OutgoingResponse, Error> {
        let login_info = authenticator.login_info.clone();
        let response = self
            .authenticator_service
            .renew(authenticator, response)
            .await?;

        self.event_publisher
            .publish(AuthEvent::AuthenticatorRenewed {
                login_info: login_value(&login_info),
                path: request.path().to_string(),
            })
            .await;
        Ok(response)
    }

    pub(crate) async fn resolve(&self, request: &IncomingRequest) -> Result<Resolution<I>, Error> {
        let authenticator = match self.authenticator_service.retrieve(request).await? {
            Some(authenticator) => authenticator,
            None => return self.resolve_with_providers(request).await,
        };

        if !self.authenticator_service.is_valid(&authenticator) {
            debug!(
                "Authenticator for {} expired or timed out",
                authenticator.login_info
            );
            return Ok(Resolution::Rejected(authenticator));
        }

        match self
            .identity_service
            .retrieve(&authenticator.login_info)
            .await?
        {
            Some(identity) => Ok(Resolution::Stored {
                identity,
                authenticator,
            }),
            None => {
                warn!(
                    "Valid authenticator for {} has no identity",
                    authenticator.login_info
                );
                Ok(Resolution::Rejected(authenticator))
            }
        }
    }

    async fn resolve_with_providers(&self, request: &IncomingRequest) -> Result<Resolution<I>, Error> {
        for provider in &self.request_providers {
            let login_info = match provider.authenticate(request).await? {
                Some(login_info) => login_info,
                None => continue,
            };

            match self.identity_service.retrieve(&login_info).await? {
                Some(identity) => {
                    debug!("{} authenticated {}", provider.id(), login_info);
                    let authenticator = self
                        .authenticator_service
                        .create(login_info, request)
                        .await?;
                    return Ok(Resolution::Provided {
                        identity,
                        authenticator,
                    });
                }
                None => debug!(
                    "{} authenticated {} but no identity exists",
                    provider.id(),
                    login_info
                ),
            }
        }
        Ok(Resolution::Anonymous)
    }

    pub(crate) async fn publish(&self, event: AuthEvent) {
        self.event_publisher.publish(event).await;
    }
}

pub(crate) fn login_value(login_info: &LoginInfo) -> Value {
    serde_json::to_value(login_info).unwrap_or_default()
}
