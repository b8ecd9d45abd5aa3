//! HMAC-SHA256 signing of cookie values and OAuth2 state.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::error::{crypto_error, CryptoErrorKind, Error};

type HmacSha256 = Hmac<Sha256>;

/// Signs values so that tampering can be detected, and extracts them again.
pub trait Signer: Send + Sync {
    /// Returns `data` together with its signature.
    fn sign(&self, data: &str) -> String;

    /// Verifies a signed message and returns the original data.
    fn extract(&self, message: &str) -> Result<String, Error>;
}

/// Settings for the [`HmacSigner`].
#[derive(Debug, Clone)]
pub struct HmacSignerSettings {
    /// Secret key for the HMAC.
    pub key: SecretString,
    /// Mixed around the data before signing, so that a leaked key alone
    /// cannot be used with signatures produced by another application.
    pub pepper: String,
}

impl HmacSignerSettings {
    pub fn new(key: SecretString) -> Self {
        Self {
            key,
            pepper: "-portcullis-signer-".to_string(),
        }
    }
}

/// HMAC-SHA256 signer.
///
/// A signed message has the form `{version}-{hex signature}-{data}`.
pub struct HmacSigner {
    settings: HmacSignerSettings,
}

impl HmacSigner {
    const VERSION: &'static str = "1";

    pub fn new(settings: HmacSignerSettings) -> Self {
        Self { settings }
    }

    fn mac(&self, data: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(self.settings.key.expose_secret().as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any size"));
        mac.update(self.settings.pepper.as_bytes());
        mac.update(data.as_bytes());
        mac.update(self.settings.pepper.as_bytes());
        mac
    }
}

impl Signer for HmacSigner {
    fn sign(&self, data: &str) -> String {
        let signature = hex::encode(self.mac(data).finalize().into_bytes());
        format!("{}-{}-{}", Self::VERSION, signature, data)
    }

    fn extract(&self, message: &str) -> Result<String, Error> {
        let mut parts = message.splitn(3, '-');
        let (version, signature, data) = match (parts.next(), parts.next(), parts.next()) {
            (Some(version), Some(signature), Some(data)) => (version, signature, data),
            _ => {
                return Err(crypto_error(
                    CryptoErrorKind::InvalidSignature,
                    "Invalid signed message format",
                ))
            }
        };

        if version != Self::VERSION {
            return Err(crypto_error(
                CryptoErrorKind::InvalidSignature,
                &format!("Unsupported signature version: {}", version),
            ));
        }

        let expected_sig = hex::decode(signature).map_err(|_| {
            crypto_error(CryptoErrorKind::InvalidSignature, "Invalid signature format")
        })?;

        self.mac(data)
            .verify_slice(&expected_sig)
            .map_err(|_| crypto_error(CryptoErrorKind::InvalidSignature, "Bad signature"))?;

        Ok(data.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn signer(key: &str) -> HmacSigner {
        HmacSigner::new(HmacSignerSettings::new(SecretString::from(key.to_string())))
    }

    #[test]
    fn test_sign_and_extract() {
        let signer = signer("test_secret");
        let signed = signer.sign("some-value-with-dashes");

        assert!(signed.starts_with("1-"));
        assert_eq!(signer.extract(&signed).unwrap(), "some-value-with-dashes");
    }

    #[test]
    fn test_tampered_data_is_rejected() {
        let signer = signer("test_secret");
        let signed = signer.sign("user-1");
        let tampered = signed.replace("user-1", "user-2");

        let result = signer.extract(&tampered);
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Crypto(CryptoErrorKind::InvalidSignature),
                ..
            })
        ));
    }

    #[test]
    fn test_other_key_is_rejected() {
        let signed = signer("first").sign("value");
        assert!(signer("second").extract(&signed).is_err());
    }

    #[test]
    fn test_unsigned_value_is_rejected() {
        let signer = signer("test_secret");
        assert!(signer.extract("value").is_err());
        assert!(signer.extract("2-abcd-value").is_err());
        assert!(signer.extract("1-not_hex-value").is_err());
    }
}
