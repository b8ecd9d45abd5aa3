//! # portcullis
//!
//! Ties the `portcullis-auth` building blocks to an application: an
//! [`Environment`] bundles the identity service, authenticator service,
//! request providers and event publisher, and hands out request handlers
//! that authenticate a request before the application's code runs.
//!
//! ```rust,ignore
//! let environment = Environment::new(identities, factory::bearer_token_authenticator_service(&config, repository)?)
//!     .with_request_provider(Arc::new(BasicAuthProvider::new(password_provider)));
//!
//! let outcome = environment
//!     .secured()
//!     .handle(request, |secured| async move { Ok(render(secured.identity)) })
//!     .await?;
//! ```

pub mod commands;
pub mod environment;
pub mod factory;
pub mod handler;

pub use environment::Environment;
pub use handler::{
    SecuredOutcome, SecuredRequest, SecuredRequestHandler, UserAwareRequest,
    UserAwareRequestHandler,
};
