//! Random identifier generation.

use async_trait::async_trait;
use rand::RngCore;

use crate::error::Error;

/// Generates unique, unguessable identifiers (authenticator ids, CSRF tokens, nonces).
#[async_trait]
pub trait IdGenerator: Send + Sync {
    async fn generate(&self) -> Result<String, Error>;
}

/// Hex-encoded identifiers drawn from the thread-local CSPRNG.
#[derive(Debug, Clone)]
pub struct SecureRandomIdGenerator {
    size_in_bytes: usize,
}

impl SecureRandomIdGenerator {
    pub fn new(size_in_bytes: usize) -> Self {
        Self { size_in_bytes }
    }
}

impl Default for SecureRandomIdGenerator {
    /// 128 bytes, as for session ids.
    fn default() -> Self {
        Self::new(128)
    }
}

#[async_trait]
impl IdGenerator for SecureRandomIdGenerator {
    async fn generate(&self) -> Result<String, Error> {
        let mut bytes = vec![0u8; self.size_in_bytes];
        rand::thread_rng().fill_bytes(&mut bytes);
        Ok(hex::encode(bytes))
    }
}
