use std::sync::Arc;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::auth_info::PasswordInfo;
use crate::crypto::constant_time_eq;

/// Hashes passwords and checks supplied passwords against stored hashes.
pub trait PasswordHasher: Send + Sync {
    /// Stored in [`PasswordInfo::hasher`] to find the hasher again.
    fn id(&self) -> &str;

    fn hash(&self, plain_password: &str) -> PasswordInfo;

    fn matches(&self, password_info: &PasswordInfo, supplied_password: &str) -> bool;

    /// Whether this hasher produced `password_info`.
    fn is_suitable(&self, password_info: &PasswordInfo) -> bool {
        password_info.hasher == self.id()
    }

    /// Whether the hash should be replaced, e.g. because its cost parameters are
    /// below the current ones. `None` if the hasher cannot tell.
    fn is_deprecated(&self, password_info: &PasswordInfo) -> Option<bool>;
}

/// PHC-string hashes from the `password-auth` crate (argon2 by default).
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordAuthHasher;

impl PasswordAuthHasher {
    pub const ID: &'static str = "password-auth";
}

impl PasswordHasher for PasswordAuthHasher {
    fn id(&self) -> &str {
        Self::ID
    }

    fn hash(&self, plain_password: &str) -> PasswordInfo {
        PasswordInfo {
            hasher: Self::ID.to_string(),
            password: password_auth::generate_hash(plain_password),
            salt: None,
        }
    }

    fn matches(&self, password_info: &PasswordInfo, supplied_password: &str) -> bool {
        password_auth::verify_password(supplied_password, &password_info.password).is_ok()
    }

    fn is_deprecated(&self, password_info: &PasswordInfo) -> Option<bool> {
        password_auth::is_hash_obsolete(&password_info.password).ok()
    }
}

/// Hex SHA-256 over `salt + password`.
///
/// Only meant for verifying legacy data; register it as deprecated so that
/// matching passwords get re-hashed.
#[derive(Debug, Clone)]
pub struct LegacySha256Hasher {
    salt_size_in_bytes: usize,
}

impl LegacySha256Hasher {
    pub const ID: &'static str = "sha256";

    pub fn new(salt_size_in_bytes: usize) -> Self {
        Self { salt_size_in_bytes }
    }

    fn digest(salt: Option<&str>, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.unwrap_or_default().as_bytes());
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for LegacySha256Hasher {
    fn default() -> Self {
        Self::new(16)
    }
}

impl PasswordHasher for LegacySha256Hasher {
    fn id(&self) -> &str {
        Self::ID
    }

    fn hash(&self, plain_password: &str) -> PasswordInfo {
        let mut salt = vec![0u8; self.salt_size_in_bytes];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt = hex::encode(salt);

        PasswordInfo {
            hasher: Self::ID.to_string(),
            password: Self::digest(Some(&salt), plain_password),
            salt: Some(salt),
        }
    }

    fn matches(&self, password_info: &PasswordInfo, supplied_password: &str) -> bool {
        let supplied = Self::digest(password_info.salt.as_deref(), supplied_password);
        constant_time_eq(&supplied, &password_info.password)
    }

    fn is_deprecated(&self, _password_info: &PasswordInfo) -> Option<bool> {
        Some(false)
    }
}

/// The hasher new passwords are hashed with, plus hashers still accepted
/// for existing hashes.
#[derive(Clone)]
pub struct PasswordHasherRegistry {
    current: Arc<dyn PasswordHasher>,
    deprecated: Vec<Arc<dyn PasswordHasher>>,
}

impl PasswordHasherRegistry {
    pub fn new(current: Arc<dyn PasswordHasher>, deprecated: Vec<Arc<dyn PasswordHasher>>) -> Self {
        Self {
            current,
            deprecated,
        }
    }

    pub fn current(&self) -> &Arc<dyn PasswordHasher> {
        &self.current
    }

    pub fn deprecated(&self) -> &[Arc<dyn PasswordHasher>] {
        &self.deprecated
    }

    /// Ids of every registered hasher, current one first.
    pub fn ids(&self) -> Vec<&str> {
        std::iter::once(&self.current)
            .chain(self.deprecated.iter())
            .map(|hasher| hasher.id())
            .collect()
    }

    /// The hasher that produced `password_info`, current one first.
    pub fn find(&self, password_info: &PasswordInfo) -> Option<&Arc<dyn PasswordHasher>> {
        std::iter::once(&self.current)
            .chain(self.deprecated.iter())
            .find(|hasher| hasher.is_suitable(password_info))
    }

    /// Whether `password_info` was produced by one of the deprecated hashers.
    pub fn is_deprecated(&self, password_info: &PasswordInfo) -> bool {
        !self.current.is_suitable(password_info)
            && self
                .deprecated
                .iter()
                .any(|hasher| hasher.is_suitable(password_info))
    }
}

impl Default for PasswordHasherRegistry {
    /// `password-auth` for new hashes, legacy SHA-256 hashes still accepted.
    fn default() -> Self {
        Self::new(
            Arc::new(PasswordAuthHasher),
            vec![Arc::new(LegacySha256Hasher::default())],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_auth_hasher() {
        let hasher = PasswordAuthHasher;
        let info = hasher.hash("correct horse");

        assert_eq!(info.hasher, "password-auth");
        assert!(info.password.starts_with('$'));
        assert!(hasher.matches(&info, "correct horse"));
        assert!(!hasher.matches(&info, "battery staple"));
        assert_eq!(hasher.is_deprecated(&info), Some(false));
    }

    #[test]
    fn test_password_auth_hasher_cannot_judge_foreign_hash() {
        let info = PasswordInfo {
            hasher: PasswordAuthHasher::ID.to_string(),
            password: "not a phc string".to_string(),
            salt: None,
        };
        assert_eq!(PasswordAuthHasher.is_deprecated(&info), None);
        assert!(!PasswordAuthHasher.matches(&info, "anything"));
    }

    #[test]
    fn test_legacy_hasher_salts_each_hash() {
        let hasher = LegacySha256Hasher::default();
        let first = hasher.hash("secret");
        let second = hasher.hash("secret");

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.password, second.password);
        assert!(hasher.matches(&first, "secret"));
        assert!(!hasher.matches(&first, "Secret"));
    }

    #[test]
    fn test_legacy_hasher_accepts_unsalted_hash() {
        let info = PasswordInfo {
            hasher: LegacySha256Hasher::ID.to_string(),
            // sha256("password")
            password: "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8".to_string(),
            salt: None,
        };
        assert!(LegacySha256Hasher::default().matches(&info, "password"));
    }

    #[test]
    fn test_registry_finds_hasher_by_id() {
        let registry = PasswordHasherRegistry::default();
        let legacy = LegacySha256Hasher::default().hash("secret");
        let current = PasswordAuthHasher.hash("secret");
        let unknown = PasswordInfo {
            hasher: "md5".to_string(),
            password: "x".to_string(),
            salt: None,
        };

        assert_eq!(registry.find(&legacy).map(|h| h.id()), Some("sha256"));
        assert_eq!(registry.find(&current).map(|h| h.id()), Some("password-auth"));
        assert!(registry.find(&unknown).is_none());

        assert!(registry.is_deprecated(&legacy));
        assert!(!registry.is_deprecated(&current));
        assert!(!registry.is_deprecated(&unknown));
    }

    #[test]
    fn test_registry_ids_list_current_first() {
        assert_eq!(
            PasswordHasherRegistry::default().ids(),
            vec!["password-auth", "sha256"]
        );
    }
}
