//! Session authenticators: the whole authenticator, encoded and signed, in the session.

use std::sync::Arc;

use super::{Authenticator, AuthenticatorEncoder, AuthenticatorSettings, Decoded, Transport};
use crate::crypto::Signer;
use crate::error::Error;
use crate::http::{IncomingRequest, OutgoingResponse};

pub struct SessionTransport {
    session_key: String,
    signer: Arc<dyn Signer>,
    encoder: Arc<dyn AuthenticatorEncoder>,
}

impl SessionTransport {
    pub const DEFAULT_SESSION_KEY: &'static str = "authenticator";

    pub fn new(
        session_key: impl Into<String>,
        signer: Arc<dyn Signer>,
        encoder: Arc<dyn AuthenticatorEncoder>,
    ) -> Self {
        Self {
            session_key: session_key.into(),
            signer,
            encoder,
        }
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }
}

impl Transport for SessionTransport {
    /// The signed session value.
    type Artifact = String;

    fn kind(&self) -> &'static str {
        "session"
    }

    fn is_self_contained(&self) -> bool {
        true
    }

    fn supports_fingerprinting(&self) -> bool {
        true
    }

    fn extract(&self, request: &IncomingRequest) -> Option<String> {
        request.session_value(&self.session_key).map(str::to_string)
    }

    fn decode(&self, raw: &str, _settings: &AuthenticatorSettings) -> Result<Decoded, Error> {
        let encoded = self.signer.extract(raw)?;
        let json = self.encoder.decode(&encoded)?;
        Ok(Decoded::Embedded(serde_json::from_str(&json)?))
    }

    fn encode(&self, authenticator: &Authenticator) -> Result<String, Error> {
        let json = serde_json::to_string(authenticator)?;
        Ok(self.signer.sign(&self.encoder.encode(&json)?))
    }

    fn embed(&self, artifact: String, response: OutgoingResponse) -> OutgoingResponse {
        response.with_session_value(self.session_key.clone(), artifact)
    }

    fn embed_into_request(&self, artifact: String, request: IncomingRequest) -> IncomingRequest {
        request.with_session_value(self.session_key.clone(), artifact)
    }

    fn discard(&self, response: OutgoingResponse) -> OutgoingResponse {
        response.without_session_value(&self.session_key)
    }
}
