//! # portcullis-auth
//!
//! Authentication building blocks for web applications:
//! - Authenticators (cookie, session, bearer token, JWT) and their lifecycle
//! - OAuth2 social login with signed, extensible state (CSRF, user state)
//! - OAuth1 social login with HMAC-SHA1 request signing
//! - Password hashing, re-hashing of outdated hashes, credentials and basic auth
//! - Signing and encryption primitives, HTTP client with retries
//!
//! ## Architecture
//!
//! Nothing in this crate is tied to a web framework. Integrations convert
//! their requests into an [`http::IncomingRequest`] and apply the resulting
//! [`http::OutgoingResponse`] (cookies, headers, session changes).
//! Persistence is behind traits ([`authenticator::AuthenticatorRepository`],
//! [`auth_info::AuthInfoRepository`], [`identity::IdentityService`]) with
//! in-memory implementations for tests and single-instance deployments.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use portcullis_auth::{
//!     authenticator::{BearerTokenTransport, AuthenticatorService, InMemoryAuthenticatorRepository},
//!     login::LoginInfo,
//! };
//!
//! let service = AuthenticatorService::builder(BearerTokenTransport::default())
//!     .with_repository(Arc::new(InMemoryAuthenticatorRepository::new()))
//!     .build();
//! let authenticator = service.create(LoginInfo::new("credentials", "jane@example.com"), &request).await?;
//! let token = service.init(authenticator).await?;
//! let response = service.embed(token, OutgoingResponse::ok());
//! ```

pub mod auth_info;
pub mod authenticator;
pub mod crypto;
pub mod error;
pub mod http;
pub mod identity;
pub mod login;
pub mod oauth1;
pub mod oauth2;
pub mod password;
pub mod provider;
pub mod util;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
pub use login::LoginInfo;
