//! Encoding of authenticator payloads that travel to the client.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::crypto::Crypter;
use crate::error::{CryptoErrorKind, Error, ErrorKind};

/// Turns a serialized authenticator (or part of it) into a transport-safe string.
pub trait AuthenticatorEncoder: Send + Sync {
    fn encode(&self, data: &str) -> Result<String, Error>;
    fn decode(&self, data: &str) -> Result<String, Error>;
}

/// Base64url only; the payload stays readable by the client.
#[derive(Debug, Clone, Default)]
pub struct Base64AuthenticatorEncoder;

impl AuthenticatorEncoder for Base64AuthenticatorEncoder {
    fn encode(&self, data: &str) -> Result<String, Error> {
        Ok(URL_SAFE_NO_PAD.encode(data))
    }

    fn decode(&self, data: &str) -> Result<String, Error> {
        let bytes = URL_SAFE_NO_PAD.decode(data)?;
        String::from_utf8(bytes).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Crypto(CryptoErrorKind::Encoding),
        })
    }
}

/// Encrypts the payload.
pub struct CrypterAuthenticatorEncoder {
    crypter: Arc<dyn Crypter>,
}

impl CrypterAuthenticatorEncoder {
    pub fn new(crypter: Arc<dyn Crypter>) -> Self {
        Self { crypter }
    }
}

impl AuthenticatorEncoder for CrypterAuthenticatorEncoder {
    fn encode(&self, data: &str) -> Result<String, Error> {
        self.crypter.encrypt(data)
    }

    fn decode(&self, data: &str) -> Result<String, Error> {
        self.crypter.decrypt(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AesGcmCrypter;
    use secrecy::SecretString;

    #[test]
    fn test_base64_rejects_garbage() {
        let result = Base64AuthenticatorEncoder.decode("%%%");
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Crypto(CryptoErrorKind::Encoding),
                ..
            })
        ));
    }

    #[test]
    fn test_crypter_encoder_hides_payload() {
        let encoder = CrypterAuthenticatorEncoder::new(Arc::new(AesGcmCrypter::new(
            &SecretString::from("key".to_string()),
        )));
        let encoded = encoder.encode(r#"{"providerKey":"jane@example.com"}"#).unwrap();
        assert!(!encoded.contains("jane"));
        assert_eq!(
            encoder.decode(&encoded).unwrap(),
            r#"{"providerKey":"jane@example.com"}"#
        );
    }
}
