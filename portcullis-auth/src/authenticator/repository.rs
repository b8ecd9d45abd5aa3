//! Persistence for stateful authenticators.

use async_trait::async_trait;
use dashmap::DashMap;

use super::Authenticator;
use crate::error::{storage_error, Error, StorageErrorKind};

/// Trait for storing authenticators by id.
///
/// The repository is the only place authenticator state is mutated
/// concurrently, so implementations must make add, update and remove atomic
/// per id (a single-row write, a cache `SET`, ...).
#[async_trait]
pub trait AuthenticatorRepository: Send + Sync {
    /// `None` if no authenticator with this id is stored.
    async fn find(&self, id: &str) -> Result<Option<Authenticator>, Error>;

    async fn add(&self, authenticator: Authenticator) -> Result<Authenticator, Error>;

    async fn update(&self, authenticator: Authenticator) -> Result<Authenticator, Error>;

    /// Removing an id that is not stored is not an error.
    async fn remove(&self, id: &str) -> Result<(), Error>;
}

/// Authenticator repository backed by a concurrent map.
#[derive(Default)]
pub struct InMemoryAuthenticatorRepository {
    entries: DashMap<String, Authenticator>,
}

impl InMemoryAuthenticatorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AuthenticatorRepository for InMemoryAuthenticatorRepository {
    async fn find(&self, id: &str) -> Result<Option<Authenticator>, Error> {
        Ok(self.entries.get(id).map(|entry| entry.value().clone()))
    }

    async fn add(&self, authenticator: Authenticator) -> Result<Authenticator, Error> {
        self.entries
            .insert(authenticator.id.clone(), authenticator.clone());
        Ok(authenticator)
    }

    async fn update(&self, authenticator: Authenticator) -> Result<Authenticator, Error> {
        match self.entries.get_mut(&authenticator.id) {
            Some(mut entry) => {
                *entry = authenticator.clone();
                Ok(authenticator)
            }
            None => Err(storage_error(
                StorageErrorKind::NotFound,
                "Cannot update an authenticator that is not stored",
            )),
        }
    }

    async fn remove(&self, id: &str) -> Result<(), Error> {
        self.entries.remove(id);
        Ok(())
    }
}
