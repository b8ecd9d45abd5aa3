//! Client fingerprints for cookie and session authenticators.

use reqwest::header::{ACCEPT_CHARSET, ACCEPT_LANGUAGE, USER_AGENT};
use sha2::{Digest, Sha256};

use crate::http::IncomingRequest;

/// Derives a stable hash from request attributes that identify the client.
///
/// A cookie or session authenticator stolen from one client and replayed
/// from another then no longer matches, and is treated as absent.
pub trait FingerprintGenerator: Send + Sync {
    fn generate(&self, request: &IncomingRequest) -> String;
}

/// SHA-256 over `User-Agent`, `Accept-Language`, `Accept-Charset` and,
/// optionally, the remote address.
#[derive(Debug, Clone, Default)]
pub struct DefaultFingerprintGenerator {
    include_remote_address: bool,
}

impl DefaultFingerprintGenerator {
    pub fn new(include_remote_address: bool) -> Self {
        Self {
            include_remote_address,
        }
    }
}

impl FingerprintGenerator for DefaultFingerprintGenerator {
    fn generate(&self, request: &IncomingRequest) -> String {
        let mut parts = vec![
            request.header(USER_AGENT.as_str()).unwrap_or_default(),
            request.header(ACCEPT_LANGUAGE.as_str()).unwrap_or_default(),
            request.header(ACCEPT_CHARSET.as_str()).unwrap_or_default(),
        ];
        if self.include_remote_address {
            parts.push(request.remote_address().unwrap_or_default());
        }

        hex::encode(Sha256::digest(parts.join(":").as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn request(agent: &'static str) -> IncomingRequest {
        IncomingRequest::new()
            .with_header(USER_AGENT, HeaderValue::from_static(agent))
            .with_header(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"))
    }

    #[test]
    fn test_same_client_same_fingerprint() {
        let generator = DefaultFingerprintGenerator::default();
        assert_eq!(
            generator.generate(&request("firefox")),
            generator.generate(&request("firefox"))
        );
    }

    #[test]
    fn test_other_client_other_fingerprint() {
        let generator = DefaultFingerprintGenerator::default();
        assert_ne!(
            generator.generate(&request("firefox")),
            generator.generate(&request("curl"))
        );
    }

    #[test]
    fn test_remote_address_only_counts_when_enabled() {
        let first = request("firefox").with_remote_address("10.0.0.1");
        let second = request("firefox").with_remote_address("10.0.0.2");

        let without = DefaultFingerprintGenerator::new(false);
        assert_eq!(without.generate(&first), without.generate(&second));

        let with = DefaultFingerprintGenerator::new(true);
        assert_ne!(with.generate(&first), with.generate(&second));
    }
}
