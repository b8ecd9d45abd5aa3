//! Provider-specific credential material and its storage.
//!
//! Auth info is persisted separately from authenticators: an authenticator
//! tracks a session, auth info is what a provider needs to authenticate the
//! user again (password hash, OAuth tokens).

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{storage_error, Error, StorageErrorKind};
use crate::login::LoginInfo;

/// Marker for the credential types a provider can produce.
pub trait AuthInfo: Clone + Send + Sync + 'static {}

/// OAuth1 access token and secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuth1Info {
    pub token: String,
    pub secret: String,
}

impl AuthInfo for OAuth1Info {}

/// OAuth2 tokens as returned by the access-token endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Info {
    pub access_token: String,
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    /// Any further fields of the token response (`id_token`, `scope`, ...).
    pub params: Option<BTreeMap<String, String>>,
}

impl AuthInfo for OAuth2Info {}

/// A password hash together with the id of the hasher that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordInfo {
    pub hasher: String,
    pub password: String,
    pub salt: Option<String>,
}

impl AuthInfo for PasswordInfo {}

/// Trait for storing and retrieving auth info by login info.
///
/// Implementations should:
/// - Encrypt OAuth tokens at rest
/// - Make single-key writes atomic; no cross-key transactions are required
#[async_trait]
pub trait AuthInfoRepository<A: AuthInfo>: Send + Sync {
    /// `None` if nothing is stored for the login info.
    async fn find(&self, login_info: &LoginInfo) -> Result<Option<A>, Error>;

    async fn add(&self, login_info: &LoginInfo, auth_info: A) -> Result<A, Error>;

    /// Fails with `StorageErrorKind::NotFound` if nothing is stored yet.
    async fn update(&self, login_info: &LoginInfo, auth_info: A) -> Result<A, Error>;

    /// Adds or updates.
    async fn save(&self, login_info: &LoginInfo, auth_info: A) -> Result<A, Error>;

    async fn remove(&self, login_info: &LoginInfo) -> Result<(), Error>;
}

/// Auth info repository backed by a concurrent map.
///
/// Useful for tests and single-instance deployments.
pub struct InMemoryAuthInfoRepository<A: AuthInfo> {
    entries: DashMap<LoginInfo, A>,
}

impl<A: AuthInfo> InMemoryAuthInfoRepository<A> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A: AuthInfo> Default for InMemoryAuthInfoRepository<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<A: AuthInfo> AuthInfoRepository<A> for InMemoryAuthInfoRepository<A> {
    async fn find(&self, login_info: &LoginInfo) -> Result<Option<A>, Error> {
        Ok(self.entries.get(login_info).map(|entry| entry.value().clone()))
    }

    async fn add(&self, login_info: &LoginInfo, auth_info: A) -> Result<A, Error> {
        self.entries.insert(login_info.clone(), auth_info.clone());
        Ok(auth_info)
    }

    async fn update(&self, login_info: &LoginInfo, auth_info: A) -> Result<A, Error> {
        match self.entries.get_mut(login_info) {
            Some(mut entry) => {
                *entry = auth_info.clone();
                Ok(auth_info)
            }
            None => Err(storage_error(
                StorageErrorKind::NotFound,
                &format!("No auth info stored for {}", login_info),
            )),
        }
    }

    async fn save(&self, login_info: &LoginInfo, auth_info: A) -> Result<A, Error> {
        self.add(login_info, auth_info).await
    }

    async fn remove(&self, login_info: &LoginInfo) -> Result<(), Error> {
        self.entries.remove(login_info);
        Ok(())
    }
}
