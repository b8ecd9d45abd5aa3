//! The application's user model, as far as authentication is concerned.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Error;
use crate::login::LoginInfo;

/// Marker for the application's user type.
pub trait Identity: Clone + Send + Sync + 'static {}

/// Looks up identities by the login info an authenticator or provider yields.
#[async_trait]
pub trait IdentityService<I: Identity>: Send + Sync {
    async fn retrieve(&self, login_info: &LoginInfo) -> Result<Option<I>, Error>;
}

/// Identities kept in a concurrent map.
pub struct InMemoryIdentityService<I: Identity> {
    identities: DashMap<LoginInfo, I>,
}

impl<I: Identity> InMemoryIdentityService<I> {
    pub fn new() -> Self {
        Self {
            identities: DashMap::new(),
        }
    }

    pub fn save(&self, login_info: LoginInfo, identity: I) {
        self.identities.insert(login_info, identity);
    }

    pub fn remove(&self, login_info: &LoginInfo) {
        self.identities.remove(login_info);
    }
}

impl<I: Identity> Default for InMemoryIdentityService<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I: Identity> IdentityService<I> for InMemoryIdentityService<I> {
    async fn retrieve(&self, login_info: &LoginInfo) -> Result<Option<I>, Error> {
        Ok(self
            .identities
            .get(login_info)
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        name: String,
    }

    impl Identity for User {}

    #[tokio::test]
    async fn test_retrieve_saved_identity() {
        let service = InMemoryIdentityService::new();
        let login_info = LoginInfo::new("credentials", "jane@example.com");
        service.save(
            login_info.clone(),
            User {
                name: "Jane".to_string(),
            },
        );

        let user = service.retrieve(&login_info).await.unwrap();
        assert_eq!(user.map(|u| u.name), Some("Jane".to_string()));

        service.remove(&login_info);
        assert_eq!(service.retrieve(&login_info).await.unwrap(), None);
    }
}
