use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::hasher::PasswordHasherRegistry;
use crate::auth_info::{AuthInfoRepository, PasswordInfo};
use crate::error::{authentication_error, AuthenticationErrorKind, Error};
use crate::http::IncomingRequest;
use crate::login::LoginInfo;
use crate::provider::RequestProvider;

/// Outcome of checking a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordState {
    Authenticated,
    InvalidPassword,
    /// The stored hash was produced by a hasher that is not registered.
    UnsupportedHasher,
    /// No password is stored for the login info.
    NotFound,
}

/// Checks passwords against stored [`PasswordInfo`] and migrates outdated hashes.
#[derive(Clone)]
pub struct PasswordProvider {
    auth_info_repository: Arc<dyn AuthInfoRepository<PasswordInfo>>,
    registry: PasswordHasherRegistry,
}

impl PasswordProvider {
    pub fn new(
        auth_info_repository: Arc<dyn AuthInfoRepository<PasswordInfo>>,
        registry: PasswordHasherRegistry,
    ) -> Self {
        Self {
            auth_info_repository,
            registry,
        }
    }

    pub fn registry(&self) -> &PasswordHasherRegistry {
        &self.registry
    }

    /// A matching password whose hash is outdated, either because its hasher
    /// is deprecated or because the hasher says so, is re-hashed with the
    /// current hasher and stored with a single `update`.
    pub async fn authenticate(
        &self,
        login_info: &LoginInfo,
        password: &str,
    ) -> Result<PasswordState, Error> {
        let password_info = match self.auth_info_repository.find(login_info).await? {
            Some(password_info) => password_info,
            None => return Ok(PasswordState::NotFound),
        };

        let hasher = match self.registry.find(&password_info) {
            Some(hasher) => hasher,
            None => {
                warn!(
                    "Password of {} was hashed with unsupported hasher {}; registered: {}",
                    login_info,
                    password_info.hasher,
                    self.registry.ids().join(", ")
                );
                return Ok(PasswordState::UnsupportedHasher);
            }
        };

        if !hasher.matches(&password_info, password) {
            return Ok(PasswordState::InvalidPassword);
        }

        let outdated = self.registry.is_deprecated(&password_info)
            || match hasher.is_deprecated(&password_info) {
                Some(deprecated) => deprecated,
                None => {
                    debug!(
                        "Hasher {} cannot tell whether the hash of {} is deprecated",
                        hasher.id(),
                        login_info
                    );
                    false
                }
            };

        if outdated {
            info!(
                "Re-hashing password of {} with {}",
                login_info,
                self.registry.current().id()
            );
            let rehashed = self.registry.current().hash(password);
            self.auth_info_repository.update(login_info, rehashed).await?;
        }

        Ok(PasswordState::Authenticated)
    }

    fn unsupported_hasher_error(&self, login_info: &LoginInfo) -> Error {
        authentication_error(
            AuthenticationErrorKind::UnsupportedHasher,
            &format!(
                "Password of {} uses an unsupported hasher; registered hashers: {}",
                login_info,
                self.registry.ids().join(", ")
            ),
        )
    }
}

/// Identifier and password as submitted by a sign-in form.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

/// Authenticates [`Credentials`] against passwords stored under the
/// `credentials` provider id.
#[derive(Clone)]
pub struct CredentialsProvider {
    password_provider: PasswordProvider,
}

impl CredentialsProvider {
    pub const ID: &'static str = "credentials";

    pub fn new(password_provider: PasswordProvider) -> Self {
        Self { password_provider }
    }

    pub fn id(&self) -> &str {
        Self::ID
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> Result<LoginInfo, Error> {
        let login_info = LoginInfo::new(Self::ID, credentials.identifier.clone());

        match self
            .password_provider
            .authenticate(&login_info, &credentials.password)
            .await?
        {
            PasswordState::Authenticated => Ok(login_info),
            PasswordState::InvalidPassword => Err(authentication_error(
                AuthenticationErrorKind::InvalidPassword,
                &format!("Invalid password for {}", login_info),
            )),
            PasswordState::NotFound => Err(authentication_error(
                AuthenticationErrorKind::IdentityNotFound,
                &format!("No password stored for {}", login_info),
            )),
            PasswordState::UnsupportedHasher => {
                Err(self.password_provider.unsupported_hasher_error(&login_info))
            }
        }
    }
}

/// Authenticates requests carrying `Authorization: Basic ...`.
///
/// Shares the `credentials` namespace, so the same stored passwords work for
/// form sign-in and basic auth.
#[derive(Clone)]
pub struct BasicAuthProvider {
    password_provider: PasswordProvider,
}

impl BasicAuthProvider {
    pub const ID: &'static str = "basic-auth";

    pub fn new(password_provider: PasswordProvider) -> Self {
        Self { password_provider }
    }

    fn credentials(request: &IncomingRequest) -> Option<Credentials> {
        let header = request.header(AUTHORIZATION.as_str())?;
        let encoded = header.strip_prefix("Basic ")?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (identifier, password) = decoded.split_once(':')?;

        Some(Credentials {
            identifier: identifier.to_string(),
            password: password.to_string(),
        })
    }
}

#[async_trait]
impl RequestProvider for BasicAuthProvider {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn authenticate(&self, request: &IncomingRequest) -> Result<Option<LoginInfo>, Error> {
        let credentials = match Self::credentials(request) {
            Some(credentials) => credentials,
            None => return Ok(None),
        };
        let login_info = LoginInfo::new(CredentialsProvider::ID, credentials.identifier);

        match self
            .password_provider
            .authenticate(&login_info, &credentials.password)
            .await?
        {
            PasswordState::Authenticated => Ok(Some(login_info)),
            PasswordState::InvalidPassword | PasswordState::NotFound => {
                debug!("Basic auth rejected for {}", login_info);
                Ok(None)
            }
            PasswordState::UnsupportedHasher => {
                Err(self.password_provider.unsupported_hasher_error(&login_info))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth_info::InMemoryAuthInfoRepository;
    use crate::error::ErrorKind;
    use crate::password::{LegacySha256Hasher, PasswordAuthHasher, PasswordHasher};
    use reqwest::header::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts updates on top of the in-memory repository.
    #[derive(Default)]
    struct CountingRepository {
        inner: InMemoryAuthInfoRepository<PasswordInfo>,
        updates: AtomicUsize,
    }

    #[async_trait]
    impl AuthInfoRepository<PasswordInfo> for CountingRepository {
        async fn find(&self, login_info: &LoginInfo) -> Result<Option<PasswordInfo>, Error> {
            self.inner.find(login_info).await
        }

        async fn add(&self, login_info: &LoginInfo, auth_info: PasswordInfo) -> Result<PasswordInfo, Error> {
            self.inner.add(login_info, auth_info).await
        }

        async fn update(
            &self,
            login_info: &LoginInfo,
            auth_info: PasswordInfo,
        ) -> Result<PasswordInfo, Error> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.inner.update(login_info, auth_info).await
        }

        async fn save(&self, login_info: &LoginInfo, auth_info: PasswordInfo) -> Result<PasswordInfo, Error> {
            self.inner.save(login_info, auth_info).await
        }

        async fn remove(&self, login_info: &LoginInfo) -> Result<(), Error> {
            self.inner.remove(login_info).await
        }
    }

    fn jane() -> LoginInfo {
        LoginInfo::new("credentials", "jane@example.com")
    }

    async fn provider_with(password_info: Option<PasswordInfo>) -> (PasswordProvider, Arc<CountingRepository>) {
        let repository = Arc::new(CountingRepository::default());
        if let Some(password_info) = password_info {
            repository.add(&jane(), password_info).await.unwrap();
        }
        let provider = PasswordProvider::new(repository.clone(), PasswordHasherRegistry::default());
        (provider, repository)
    }

    fn basic(identifier: &str, password: &str) -> IncomingRequest {
        let encoded = STANDARD.encode(format!("{}:{}", identifier, password));
        IncomingRequest::new().with_header(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_current_hash_is_not_rewritten() {
        let (provider, repository) = provider_with(Some(PasswordAuthHasher.hash("secret"))).await;

        let state = provider.authenticate(&jane(), "secret").await.unwrap();
        assert_eq!(state, PasswordState::Authenticated);
        assert_eq!(repository.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deprecated_hash_is_rewritten_once() {
        let legacy = LegacySha256Hasher::default().hash("secret");
        let (provider, repository) = provider_with(Some(legacy)).await;

        let state = provider.authenticate(&jane(), "secret").await.unwrap();
        assert_eq!(state, PasswordState::Authenticated);
        assert_eq!(repository.updates.load(Ordering::SeqCst), 1);

        let stored = repository.find(&jane()).await.unwrap().unwrap();
        assert_eq!(stored.hasher, PasswordAuthHasher::ID);
        assert!(PasswordAuthHasher.matches(&stored, "secret"));

        // Already migrated
        provider.authenticate(&jane(), "secret").await.unwrap();
        assert_eq!(repository.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_of_deprecated_hash_is_not_rewritten() {
        let legacy = LegacySha256Hasher::default().hash("secret");
        let (provider, repository) = provider_with(Some(legacy)).await;

        let state = provider.authenticate(&jane(), "guess").await.unwrap();
        assert_eq!(state, PasswordState::InvalidPassword);
        assert_eq!(repository.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_login_and_unsupported_hasher() {
        let (provider, _) = provider_with(None).await;
        assert_eq!(
            provider.authenticate(&jane(), "secret").await.unwrap(),
            PasswordState::NotFound
        );

        let md5 = PasswordInfo {
            hasher: "md5".to_string(),
            password: "5ebe2294ecd0e0f08eab7690d2a6ee69".to_string(),
            salt: None,
        };
        let (provider, _) = provider_with(Some(md5)).await;
        assert_eq!(
            provider.authenticate(&jane(), "secret").await.unwrap(),
            PasswordState::UnsupportedHasher
        );
    }

    #[tokio::test]
    async fn test_credentials_provider_maps_states_to_errors() {
        let (provider, _) = provider_with(Some(PasswordAuthHasher.hash("secret"))).await;
        let credentials_provider = CredentialsProvider::new(provider);

        let login_info = credentials_provider
            .authenticate(&Credentials {
                identifier: "jane@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(login_info, jane());

        let wrong_password = credentials_provider
            .authenticate(&Credentials {
                identifier: "jane@example.com".to_string(),
                password: "guess".to_string(),
            })
            .await;
        assert!(matches!(
            wrong_password,
            Err(Error {
                error_kind: ErrorKind::Authentication(AuthenticationErrorKind::InvalidPassword),
                ..
            })
        ));

        let unknown = credentials_provider
            .authenticate(&Credentials {
                identifier: "john@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await;
        assert!(matches!(
            unknown,
            Err(Error {
                error_kind: ErrorKind::Authentication(AuthenticationErrorKind::IdentityNotFound),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_hasher_error_lists_registered_hashers() {
        let md5 = PasswordInfo {
            hasher: "md5".to_string(),
            password: "5ebe2294ecd0e0f08eab7690d2a6ee69".to_string(),
            salt: None,
        };
        let (provider, _) = provider_with(Some(md5)).await;

        let result = CredentialsProvider::new(provider.clone())
            .authenticate(&Credentials {
                identifier: "jane@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await;
        let error = match result {
            Err(error) => error,
            Ok(login_info) => panic!("{} should not authenticate", login_info),
        };
        assert_eq!(
            error.error_kind,
            ErrorKind::Authentication(AuthenticationErrorKind::UnsupportedHasher)
        );
        let message = error.to_string();
        assert!(message.contains("password-auth"), "{}", message);
        assert!(message.contains("sha256"), "{}", message);

        let basic_error = BasicAuthProvider::new(provider)
            .authenticate(&basic("jane@example.com", "secret"))
            .await
            .unwrap_err();
        assert!(basic_error.to_string().contains("password-auth, sha256"));
    }

    #[tokio::test]
    async fn test_basic_auth() {
        let (provider, _) = provider_with(Some(PasswordAuthHasher.hash("se:cret"))).await;
        let basic_auth = BasicAuthProvider::new(provider);

        assert_eq!(
            basic_auth
                .authenticate(&basic("jane@example.com", "se:cret"))
                .await
                .unwrap(),
            Some(jane())
        );
        assert_eq!(
            basic_auth
                .authenticate(&basic("jane@example.com", "guess"))
                .await
                .unwrap(),
            None
        );
        assert_eq!(
            basic_auth.authenticate(&IncomingRequest::new()).await.unwrap(),
            None
        );

        let malformed = IncomingRequest::new()
            .with_header(AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
        assert_eq!(basic_auth.authenticate(&malformed).await.unwrap(), None);
    }
}
