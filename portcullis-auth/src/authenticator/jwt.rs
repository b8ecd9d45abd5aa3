//! JWT authenticators: the authenticator travels as an HS256-signed token.
//!
//! Claims:
//! - `jti`: authenticator id
//! - `iss`: configured issuer
//! - `sub`: login info as JSON, passed through the [`AuthenticatorEncoder`]
//! - `iat`: last use, `exp`: expiry (seconds since the epoch)
//! - any custom claims, flattened next to the registered ones
//!
//! Expiry is checked by the authenticator itself, not while decoding, so an
//! expired token still decodes and is then rejected as invalid.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::bearer::token_header;
use super::{
    extract_from_request, Authenticator, AuthenticatorEncoder, AuthenticatorSettings, Decoded,
    RequestPart, Transport,
};
use crate::error::{crypto_error, CryptoErrorKind, Error};
use crate::http::{IncomingRequest, OutgoingResponse};
use crate::login::LoginInfo;

/// Claim names that custom claims must not override.
const RESERVED_CLAIMS: [&str; 7] = ["jti", "iss", "sub", "iat", "exp", "nbf", "aud"];

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub field_name: String,
    pub request_parts: Vec<RequestPart>,
    pub issuer: String,
    /// HS256 key.
    pub shared_secret: SecretString,
}

impl JwtSettings {
    pub fn new(shared_secret: SecretString) -> Self {
        Self {
            field_name: "X-Auth-Token".to_string(),
            request_parts: vec![RequestPart::Headers],
            issuer: "portcullis".to_string(),
            shared_secret,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    jti: String,
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    custom: Map<String, Value>,
}

pub struct JwtTransport {
    settings: JwtSettings,
    encoder: Arc<dyn AuthenticatorEncoder>,
}

impl JwtTransport {
    pub fn new(settings: JwtSettings, encoder: Arc<dyn AuthenticatorEncoder>) -> Self {
        Self { settings, encoder }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[&self.settings.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation
    }
}

impl Transport for JwtTransport {
    type Artifact = String;

    fn kind(&self) -> &'static str {
        "JWT"
    }

    fn is_self_contained(&self) -> bool {
        true
    }

    fn extract(&self, request: &IncomingRequest) -> Option<String> {
        extract_from_request(request, &self.settings.field_name, &self.settings.request_parts)
    }

    fn decode(&self, raw: &str, settings: &AuthenticatorSettings) -> Result<Decoded, Error> {
        let key = DecodingKey::from_secret(self.settings.shared_secret.expose_secret().as_bytes());
        let claims = jsonwebtoken::decode::<Claims>(raw, &key, &self.validation())?.claims;

        let login_info: LoginInfo = serde_json::from_str(&self.encoder.decode(&claims.sub)?)?;

        Ok(Decoded::Embedded(Authenticator {
            id: claims.jti,
            login_info,
            last_used_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
            idle_timeout: settings.idle_timeout,
            fingerprint: None,
            custom_claims: (!claims.custom.is_empty()).then_some(claims.custom),
        }))
    }

    fn encode(&self, authenticator: &Authenticator) -> Result<String, Error> {
        let custom = authenticator.custom_claims.clone().unwrap_or_default();
        if let Some(name) = custom
            .keys()
            .find(|name| RESERVED_CLAIMS.contains(&name.as_str()))
        {
            return Err(crypto_error(
                CryptoErrorKind::Encoding,
                &format!("Custom claim {} overrides a reserved claim", name),
            ));
        }

        let claims = Claims {
            jti: authenticator.id.clone(),
            iss: self.settings.issuer.clone(),
            sub: self
                .encoder
                .encode(&serde_json::to_string(&authenticator.login_info)?)?,
            iat: authenticator.last_used_at.timestamp(),
            exp: authenticator.expires_at.timestamp(),
            custom,
        };

        let key = EncodingKey::from_secret(self.settings.shared_secret.expose_secret().as_bytes());
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)?)
    }

    fn embed(&self, artifact: String, response: OutgoingResponse) -> OutgoingResponse {
        match token_header(&self.settings.field_name, &artifact) {
            Some((name, value)) => response.with_header(name, value),
            None => response,
        }
    }

    fn embed_into_request(&self, artifact: String, request: IncomingRequest) -> IncomingRequest {
        match token_header(&self.settings.field_name, &artifact) {
            Some((name, value)) => request.with_header(name, value),
            None => request,
        }
    }

    fn discard(&self, response: OutgoingResponse) -> OutgoingResponse {
        response.without_header(&self.settings.field_name)
    }
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, Error> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| crypto_error(CryptoErrorKind::Encoding, "Timestamp claim out of range"))
}
