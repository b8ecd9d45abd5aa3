//! The seam between the generic authenticator lifecycle and the ways an
//! authenticator travels to the client.

use std::fmt;

use super::{Authenticator, AuthenticatorSettings};
use crate::error::Error;
use crate::http::{IncomingRequest, OutgoingResponse};

/// What a transport found in a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The request only carried an id; the authenticator lives in a repository.
    Reference(String),
    /// The request carried the whole authenticator.
    Embedded(Authenticator),
}

/// Moves authenticators between the server and the client.
///
/// Transports are synchronous; every suspending operation (repository
/// access, id generation) stays in the service.
pub trait Transport: Send + Sync {
    /// The value handed to the client, e.g. a cookie or a token.
    type Artifact: Clone + fmt::Debug + Send + Sync;

    /// Short name for log messages.
    fn kind(&self) -> &'static str;

    /// Whether the artifact carries the whole authenticator.
    ///
    /// Self-contained artifacts are re-issued on every update; the others
    /// need a repository.
    fn is_self_contained(&self) -> bool;

    /// Whether authenticators of this kind are bound to a client fingerprint.
    fn supports_fingerprinting(&self) -> bool {
        false
    }

    /// The raw value carried by the request, if any.
    fn extract(&self, request: &IncomingRequest) -> Option<String>;

    /// Verifies and decodes a raw value returned by [`Transport::extract`].
    fn decode(&self, raw: &str, settings: &AuthenticatorSettings) -> Result<Decoded, Error>;

    fn encode(&self, authenticator: &Authenticator) -> Result<Self::Artifact, Error>;

    fn embed(&self, artifact: Self::Artifact, response: OutgoingResponse) -> OutgoingResponse;

    /// Makes the artifact visible to the rest of the current request.
    fn embed_into_request(&self, artifact: Self::Artifact, request: IncomingRequest) -> IncomingRequest;

    /// Instructs the client to drop the artifact.
    fn discard(&self, response: OutgoingResponse) -> OutgoingResponse;
}

/// Places a token-style artifact can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPart {
    Headers,
    QueryString,
    Cookies,
    Session,
}

/// Looks for `name` in the given request parts, in order.
pub fn extract_from_request(
    request: &IncomingRequest,
    name: &str,
    parts: &[RequestPart],
) -> Option<String> {
    parts
        .iter()
        .find_map(|part| match part {
            RequestPart::Headers => request.header(name),
            RequestPart::QueryString => request.query_param(name),
            RequestPart::Cookies => request.cookie(name),
            RequestPart::Session => request.session_value(name),
        })
        .map(str::to_string)
}
