//! Request handlers that authenticate a request before running the
//! application's code for it.

use std::future::Future;

use events::AuthEvent;
use portcullis_auth::authenticator::{Authenticator, TouchResult, Transport};
use portcullis_auth::http::{IncomingRequest, OutgoingResponse};
use portcullis_auth::identity::Identity;
use portcullis_auth::Error;
use reqwest::StatusCode;

use crate::environment::{login_value, Environment, Resolution};

/// An authenticated request, as handed to the block of a [`SecuredRequestHandler`].
#[derive(Debug, Clone)]
pub struct SecuredRequest<I> {
    pub identity: I,
    pub authenticator: Authenticator,
    pub request: IncomingRequest,
}

/// A request that may or may not be authenticated.
#[derive(Debug, Clone)]
pub struct UserAwareRequest<I> {
    pub identity: Option<I>,
    pub authenticator: Option<Authenticator>,
    pub request: IncomingRequest,
}

/// Result of a secured request.
///
/// Mapping `NotAuthenticated` to a login redirect or a 401 page is up to
/// the caller; the handler only prepares the response (discarded
/// authenticator included).
#[derive(Debug)]
pub enum SecuredOutcome {
    Authenticated(OutgoingResponse),
    NotAuthenticated(OutgoingResponse),
}

impl SecuredOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SecuredOutcome::Authenticated(_))
    }

    pub fn into_response(self) -> OutgoingResponse {
        match self {
            SecuredOutcome::Authenticated(response) | SecuredOutcome::NotAuthenticated(response) => {
                response
            }
        }
    }
}

/// Runs a block only for authenticated requests.
pub struct SecuredRequestHandler<I: Identity, T: Transport> {
    environment: Environment<I, T>,
    not_authenticated: OutgoingResponse,
}

impl<I: Identity, T: Transport> SecuredRequestHandler<I, T> {
    pub fn new(environment: Environment<I, T>) -> Self {
        Self {
            environment,
            not_authenticated: OutgoingResponse::new(StatusCode::UNAUTHORIZED),
        }
    }

    /// Response returned for unauthenticated requests; `401` by default.
    pub fn with_not_authenticated(mut self, response: OutgoingResponse) -> Self {
        self.not_authenticated = response;
        self
    }

    /// Authenticates `request` and, on success, runs `block` with the identity.
    ///
    /// A valid authenticator is touched before and updated after the block.
    /// A request provider hit gets a fresh authenticator embedded into the
    /// block's response. Invalid authenticators, and those whose identity no
    /// longer exists, are discarded.
    pub async fn handle<F, Fut>(
        &self,
        request: IncomingRequest,
        block: F,
    ) -> Result<SecuredOutcome, Error>
    where
        F: FnOnce(SecuredRequest<I>) -> Fut,
        Fut: Future<Output = Result<OutgoingResponse, Error>>,
    {
        let service = self.environment.authenticator_service();
        let path = request.path().to_string();

        match self.environment.resolve(&request).await? {
            Resolution::Stored {
                identity,
                authenticator,
            } => {
                let touched = service.touch(authenticator);
                let login_info = login_value(&touched.authenticator().login_info);
                let response = block(SecuredRequest {
                    identity,
                    authenticator: touched.authenticator().clone(),
                    request,
                })
                .await?;

                let response = match touched {
                    TouchResult::Touched(authenticator) => {
                        service.update(authenticator, response).await?
                    }
                    TouchResult::Untouched(_) => response,
                };

                self.environment
                    .publish(AuthEvent::Authenticated { login_info, path })
                    .await;
                Ok(SecuredOutcome::Authenticated(response))
            }
            Resolution::Provided {
                identity,
                authenticator,
            } => {
                let login_info = login_value(&authenticator.login_info);
                let response = block(SecuredRequest {
                    identity,
                    authenticator: authenticator.clone(),
                    request,
                })
                .await?;

                let artifact = service.init(authenticator).await?;
                let response = service.embed(artifact, response);

                self.environment
                    .publish(AuthEvent::Authenticated { login_info, path })
                    .await;
                Ok(SecuredOutcome::Authenticated(response))
            }
            Resolution::Rejected(authenticator) => {
                let login_info = login_value(&authenticator.login_info);
                let response = service
                    .discard(authenticator, self.not_authenticated.clone())
                    .await?;

                self.environment
                    .publish(AuthEvent::AuthenticatorDiscarded {
                        login_info,
                        path: path.clone(),
                    })
                    .await;
                self.environment
                    .publish(AuthEvent::NotAuthenticated { path })
                    .await;
                Ok(SecuredOutcome::NotAuthenticated(response))
            }
            Resolution::Anonymous => {
                self.environment
                    .publish(AuthEvent::NotAuthenticated { path })
                    .await;
                Ok(SecuredOutcome::NotAuthenticated(
                    self.not_authenticated.clone(),
                ))
            }
        }
    }
}

/// Runs a block for every request, with the identity when there is one.
pub struct UserAwareRequestHandler<I: Identity, T: Transport> {
    environment: Environment<I, T>,
}

impl<I: Identity, T: Transport> UserAwareRequestHandler<I, T> {
    pub fn new(environment: Environment<I, T>) -> Self {
        Self { environment }
    }

    /// Same authentication as [`SecuredRequestHandler::handle`], but the
    /// block always runs. An invalid authenticator is discarded from the
    /// block's response.
    pub async fn handle<F, Fut>(
        &self,
        request: IncomingRequest,
        block: F,
    ) -> Result<OutgoingResponse, Error>
    where
        F: FnOnce(UserAwareRequest<I>) -> Fut,
        Fut: Future<Output = Result<OutgoingResponse, Error>>,
    {
        let service = self.environment.authenticator_service();
        let path = request.path().to_string();

        match self.environment.resolve(&request).await? {
            Resolution::Stored {
                identity,
                authenticator,
            } => {
                let touched = service.touch(authenticator);
                let response = block(UserAwareRequest {
                    identity: Some(identity),
                    authenticator: Some(touched.authenticator().clone()),
                    request,
                })
                .await?;

                match touched {
                    TouchResult::Touched(authenticator) => service.update(authenticator, response).await,
                    TouchResult::Untouched(_) => Ok(response),
                }
            }
            Resolution::Provided {
                identity,
                authenticator,
            } => {
                let response = block(UserAwareRequest {
                    identity: Some(identity),
                    authenticator: Some(authenticator.clone()),
                    request,
                })
                .await?;

                let artifact = service.init(authenticator).await?;
                Ok(service.embed(artifact, response))
            }
            Resolution::Rejected(authenticator) => {
                let login_info = login_value(&authenticator.login_info);
                let response = block(UserAwareRequest {
                    identity: None,
                    authenticator: None,
                    request,
                })
                .await?;
                let response = service.discard(authenticator, response).await?;

                self.environment
                    .publish(AuthEvent::AuthenticatorDiscarded { login_info, path })
                    .await;
                Ok(response)
            }
            Resolution::Anonymous => {
                block(UserAwareRequest {
                    identity: None,
                    authenticator: None,
                    request,
                })
                .await
            }
        }
    }
}
