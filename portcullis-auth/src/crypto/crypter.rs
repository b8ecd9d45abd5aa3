//! AES-256-GCM encryption utilities for authenticator payloads.
//!
//! Used for session authenticators and JWT subjects that should not be
//! readable by the client. The 32-byte cipher key is derived from the
//! configured secret with SHA-256, so any passphrase can be used.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::error::{CryptoErrorKind, Error, ErrorKind};

/// 12-byte nonce size for AES-GCM
const NONCE_SIZE: usize = 12;

fn encryption_err() -> Error {
    Error {
        source: None,
        error_kind: ErrorKind::Crypto(CryptoErrorKind::EncryptionFailed),
    }
}

fn decryption_err() -> Error {
    Error {
        source: None,
        error_kind: ErrorKind::Crypto(CryptoErrorKind::DecryptionFailed),
    }
}

/// Encrypts and decrypts strings.
pub trait Crypter: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, Error>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, Error>;
}

/// AES-256-GCM crypter with a random nonce per message.
pub struct AesGcmCrypter {
    key: [u8; 32],
}

impl AesGcmCrypter {
    pub fn new(secret: &SecretString) -> Self {
        let digest = Sha256::digest(secret.expose_secret().as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }
}

impl Crypter for AesGcmCrypter {
    /// The nonce is prepended to the ciphertext, and the result is base64url-encoded
    /// so that it can travel in cookies, headers and session stores.
    fn encrypt(&self, plaintext: &str) -> Result<String, Error> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| encryption_err())?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| encryption_err())?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);

        Ok(BASE64.encode(combined))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, Error> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| decryption_err())?;

        let combined = BASE64.decode(ciphertext).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Crypto(CryptoErrorKind::DecryptionFailed),
        })?;

        if combined.len() < NONCE_SIZE {
            return Err(decryption_err());
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext_bytes = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| decryption_err())?;

        String::from_utf8(plaintext_bytes).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: ErrorKind::Crypto(CryptoErrorKind::DecryptionFailed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crypter(key: &str) -> AesGcmCrypter {
        AesGcmCrypter::new(&SecretString::from(key.to_string()))
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let crypter = crypter("crypter-secret");
        let plaintext = r#"{"id":"abc","loginInfo":{"providerId":"credentials"}}"#;
        let encrypted = crypter.encrypt(plaintext).expect("encryption should succeed");
        assert_ne!(encrypted, plaintext);
        let decrypted = crypter.decrypt(&encrypted).expect("decryption should succeed");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_produces_different_outputs() {
        let crypter = crypter("crypter-secret");
        let encrypted1 = crypter.encrypt("payload").unwrap();
        let encrypted2 = crypter.encrypt("payload").unwrap();
        assert_ne!(encrypted1, encrypted2);
    }

    #[test]
    fn test_wrong_key_returns_decryption_failed() {
        let encrypted = crypter("first").encrypt("secret").unwrap();
        let result = crypter("second").decrypt(&encrypted);
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Crypto(CryptoErrorKind::DecryptionFailed),
                ..
            })
        ));
    }

    #[test]
    fn test_corrupted_ciphertext_returns_decryption_failed() {
        let result = crypter("key").decrypt("not valid base64!!!");
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Crypto(CryptoErrorKind::DecryptionFailed),
                ..
            })
        ));
    }

    #[test]
    fn test_ciphertext_too_short_returns_decryption_failed() {
        let result = crypter("key").decrypt("YWJj"); // "abc"
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Crypto(CryptoErrorKind::DecryptionFailed),
                ..
            })
        ));
    }
}
