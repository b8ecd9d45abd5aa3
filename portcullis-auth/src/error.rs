//! Error types for the `portcullis-auth` crate.
//!
//! Follows the same pattern throughout the workspace: a root Error struct and error kind enums.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for portcullis-auth crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in portcullis-auth.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Authentication(AuthenticationErrorKind),
    OAuth2State(OAuth2StateErrorKind),
    Authenticator(AuthenticatorErrorKind),
    Crypto(CryptoErrorKind),
    Storage(StorageErrorKind),
    Http(HttpErrorKind),
}

/// Errors raised by providers while authenticating a user.
#[derive(Debug, PartialEq)]
pub enum AuthenticationErrorKind {
    Generic,
    AccessDenied,
    UnexpectedResponse,
    ProfileRetrieval,
    IdentityNotFound,
    InvalidPassword,
    UnsupportedHasher,
}

/// Errors from the OAuth2 state round trip.
#[derive(Debug, PartialEq)]
pub enum OAuth2StateErrorKind {
    /// No `state` query parameter on the callback.
    ProviderStateDoesNotExist,
    /// The out-of-band half (cookie) is missing.
    ClientStateDoesNotExist,
    /// A registered handler found no slice of its own in the state.
    ItemDoesNotExist(String),
    StateIsNotEqual,
    InvalidSignature,
    Malformed,
}

/// Lifecycle stage in which an authenticator operation failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthenticatorErrorKind {
    Creation,
    Retrieval,
    Initialization,
    Update,
    Renewal,
    Discarding,
}

/// Errors from signing and encryption.
#[derive(Debug, PartialEq)]
pub enum CryptoErrorKind {
    InvalidKey,
    InvalidSignature,
    EncryptionFailed,
    DecryptionFailed,
    Encoding,
}

/// Errors from auth info and authenticator storage.
#[derive(Debug, PartialEq)]
pub enum StorageErrorKind {
    NotFound,
    Backend,
}

/// Errors from HTTP client operations.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Network,
}

impl Error {
    /// Re-tags this error with another kind, keeping the original error as source.
    pub fn into_kind(self, error_kind: ErrorKind) -> Error {
        Error {
            source: Some(Box::new(self)),
            error_kind,
        }
    }

    /// Shortcut used by the authenticator service to tag failures with a lifecycle stage.
    pub fn in_stage(self, stage: AuthenticatorErrorKind) -> Error {
        self.into_kind(ErrorKind::Authenticator(stage))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Authentication(kind) => write!(f, "Authentication error: {:?}", kind),
            ErrorKind::OAuth2State(kind) => write!(f, "OAuth2 state error: {:?}", kind),
            ErrorKind::Authenticator(kind) => write!(f, "Authenticator error: {:?}", kind),
            ErrorKind::Crypto(kind) => write!(f, "Crypto error: {:?}", kind),
            ErrorKind::Storage(kind) => write!(f, "Storage error: {:?}", kind),
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind),
        }?;
        if let Some(source) = &self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Http(HttpErrorKind::Network),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Crypto(CryptoErrorKind::Encoding),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Crypto(CryptoErrorKind::Encoding),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as JwtErrorKind;

        let kind = match err.kind() {
            JwtErrorKind::InvalidSignature => CryptoErrorKind::InvalidSignature,
            JwtErrorKind::InvalidKeyFormat => CryptoErrorKind::InvalidKey,
            _ => CryptoErrorKind::Encoding,
        };
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Crypto(kind),
        }
    }
}

/// Helper function to create authentication errors.
pub fn authentication_error(kind: AuthenticationErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Authentication(kind),
    }
}

/// Helper function to create OAuth2 state errors.
pub fn state_error(kind: OAuth2StateErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::OAuth2State(kind),
    }
}

/// Helper function to create authenticator lifecycle errors.
pub fn authenticator_error(kind: AuthenticatorErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Authenticator(kind),
    }
}

/// Helper function to create crypto errors.
pub fn crypto_error(kind: CryptoErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Crypto(kind),
    }
}

/// Helper function to create storage errors.
pub fn storage_error(kind: StorageErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Storage(kind),
    }
}
