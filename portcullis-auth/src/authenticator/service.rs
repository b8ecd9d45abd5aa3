//! Authenticator lifecycle shared by every authenticator kind.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    Authenticator, AuthenticatorRepository, AuthenticatorSettings, Decoded,
    DefaultFingerprintGenerator, FingerprintGenerator, TouchResult, Transport,
};
use crate::error::{authenticator_error, AuthenticatorErrorKind, Error};
use crate::http::{IncomingRequest, OutgoingResponse};
use crate::login::LoginInfo;
use crate::util::{Clock, IdGenerator, SecureRandomIdGenerator, SystemClock};

/// Manages authenticators through create → init/embed → touch/update → renew → discard.
///
/// The lifecycle rules are the same for every kind; the transport decides
/// what the client receives and whether a repository is needed.
///
/// Renews for one authenticator id are serialized with a per-id lock. A
/// renew that waited for another one finds the id removed and fails, so
/// concurrent renews never mint two authenticators for one session.
pub struct AuthenticatorService<T: Transport> {
    transport: T,
    settings: AuthenticatorSettings,
    repository: Option<Arc<dyn AuthenticatorRepository>>,
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    fingerprint_generator: Arc<dyn FingerprintGenerator>,
    renew_locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Builder for [`AuthenticatorService`].
pub struct AuthenticatorServiceBuilder<T: Transport> {
    transport: T,
    settings: AuthenticatorSettings,
    repository: Option<Arc<dyn AuthenticatorRepository>>,
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    fingerprint_generator: Arc<dyn FingerprintGenerator>,
}

impl<T: Transport> AuthenticatorServiceBuilder<T> {
    /// Starts with default settings, a secure random id generator, the
    /// system clock and no repository.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            settings: AuthenticatorSettings::default(),
            repository: None,
            id_generator: Arc::new(SecureRandomIdGenerator::default()),
            clock: Arc::new(SystemClock),
            fingerprint_generator: Arc::new(DefaultFingerprintGenerator::default()),
        }
    }

    pub fn with_settings(mut self, settings: AuthenticatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Required for cookie and bearer authenticators, optional for JWT.
    pub fn with_repository(mut self, repository: Arc<dyn AuthenticatorRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_fingerprint_generator(
        mut self,
        fingerprint_generator: Arc<dyn FingerprintGenerator>,
    ) -> Self {
        self.fingerprint_generator = fingerprint_generator;
        self
    }

    pub fn build(self) -> AuthenticatorService<T> {
        if !self.transport.is_self_contained() && self.repository.is_none() {
            warn!(
                "{} authenticator service built without a repository, every lifecycle operation will fail",
                self.transport.kind()
            );
        }

        AuthenticatorService {
            transport: self.transport,
            settings: self.settings,
            repository: self.repository,
            id_generator: self.id_generator,
            clock: self.clock,
            fingerprint_generator: self.fingerprint_generator,
            renew_locks: DashMap::new(),
        }
    }
}

impl<T: Transport> AuthenticatorService<T> {
    pub fn builder(transport: T) -> AuthenticatorServiceBuilder<T> {
        AuthenticatorServiceBuilder::new(transport)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn settings(&self) -> &AuthenticatorSettings {
        &self.settings
    }

    /// Creates a new authenticator for a login.
    ///
    /// The authenticator is not persisted or sent anywhere until [`Self::init`]
    /// and [`Self::embed`] are called.
    ///
    /// # Arguments
    ///
    /// * `login_info` - The login the authenticator is bound to
    /// * `request` - The request used to derive the client fingerprint
    pub async fn create(
        &self,
        login_info: LoginInfo,
        request: &IncomingRequest,
    ) -> Result<Authenticator, Error> {
        let fingerprint = self.fingerprint(request);
        self.new_authenticator(login_info, fingerprint).await
    }

    /// Finds the authenticator carried by a request.
    ///
    /// Returns `Ok(None)` when the request carries none, when the referenced
    /// id is unknown, or when the fingerprint does not match the client.
    pub async fn retrieve(&self, request: &IncomingRequest) -> Result<Option<Authenticator>, Error> {
        let raw = match self.transport.extract(request) {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let decoded = self
            .transport
            .decode(&raw, &self.settings)
            .map_err(|e| e.in_stage(AuthenticatorErrorKind::Retrieval))?;

        let authenticator = match decoded {
            Decoded::Reference(id) => self
                .required_repository(AuthenticatorErrorKind::Retrieval)?
                .find(&id)
                .await
                .map_err(|e| e.in_stage(AuthenticatorErrorKind::Retrieval))?,
            Decoded::Embedded(authenticator) => match &self.repository {
                Some(repository) => repository
                    .find(&authenticator.id)
                    .await
                    .map_err(|e| e.in_stage(AuthenticatorErrorKind::Retrieval))?,
                None => Some(authenticator),
            },
        };

        match authenticator {
            Some(authenticator) if !self.fingerprint_matches(&authenticator, request) => {
                info!(
                    "Ignoring {} authenticator for {} presented by a different client",
                    self.transport.kind(),
                    authenticator.login_info
                );
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Persists a new authenticator (when a repository is involved) and
    /// returns the artifact to embed.
    pub async fn init(&self, authenticator: Authenticator) -> Result<T::Artifact, Error> {
        self.persist_new(&authenticator, AuthenticatorErrorKind::Initialization)
            .await?;
        self.transport
            .encode(&authenticator)
            .map_err(|e| e.in_stage(AuthenticatorErrorKind::Initialization))
    }

    /// Adds the artifact to the response, replacing any earlier one.
    pub fn embed(&self, artifact: T::Artifact, response: OutgoingResponse) -> OutgoingResponse {
        self.transport.embed(artifact, response)
    }

    /// Adds the artifact to the request so the rest of the request already sees it.
    pub fn embed_into_request(
        &self,
        artifact: T::Artifact,
        request: IncomingRequest,
    ) -> IncomingRequest {
        self.transport.embed_into_request(artifact, request)
    }

    /// Bumps `last_used_at` when an idle timeout is configured.
    pub fn touch(&self, authenticator: Authenticator) -> TouchResult {
        if authenticator.idle_timeout.is_some() {
            TouchResult::Touched(Authenticator {
                last_used_at: self.clock.now(),
                ..authenticator
            })
        } else {
            TouchResult::Untouched(authenticator)
        }
    }

    /// Writes a touched authenticator back.
    ///
    /// Store-backed kinds update the repository; self-contained kinds
    /// re-issue their artifact in the response.
    pub async fn update(
        &self,
        authenticator: Authenticator,
        response: OutgoingResponse,
    ) -> Result<OutgoingResponse, Error> {
        if let Some(repository) = self.writable_repository(AuthenticatorErrorKind::Update)? {
            repository
                .update(authenticator.clone())
                .await
                .map_err(|e| e.in_stage(AuthenticatorErrorKind::Update))?;
        }

        if self.transport.is_self_contained() {
            let artifact = self
                .transport
                .encode(&authenticator)
                .map_err(|e| e.in_stage(AuthenticatorErrorKind::Update))?;
            Ok(self.transport.embed(artifact, response))
        } else {
            Ok(response)
        }
    }

    /// Updates the authenticator only if `touch` changed it.
    pub async fn touch_and_update(
        &self,
        authenticator: Authenticator,
        response: OutgoingResponse,
    ) -> Result<OutgoingResponse, Error> {
        match self.touch(authenticator) {
            TouchResult::Touched(authenticator) => self.update(authenticator, response).await,
            TouchResult::Untouched(_) => Ok(response),
        }
    }

    /// Replaces an authenticator with a new one for the same login and
    /// embeds the new artifact.
    pub async fn renew(
        &self,
        authenticator: Authenticator,
        response: OutgoingResponse,
    ) -> Result<OutgoingResponse, Error> {
        let artifact = self.renew_artifact(authenticator).await?;
        Ok(self.transport.embed(artifact, response))
    }

    /// Removes the old authenticator, creates and initializes a new one, and
    /// returns its artifact.
    ///
    /// Not transactional: when creating the new authenticator fails after the
    /// old one was removed, the user is logged out.
    pub async fn renew_artifact(&self, authenticator: Authenticator) -> Result<T::Artifact, Error> {
        let id = authenticator.id.clone();
        let lock = self
            .renew_locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.renew_locked(authenticator).await
        };

        self.renew_locks.remove(&id);
        result
    }

    async fn renew_locked(&self, authenticator: Authenticator) -> Result<T::Artifact, Error> {
        if let Some(repository) = self.writable_repository(AuthenticatorErrorKind::Renewal)? {
            // Another renew may have replaced this authenticator while we waited
            let stored = repository
                .find(&authenticator.id)
                .await
                .map_err(|e| e.in_stage(AuthenticatorErrorKind::Renewal))?;
            if stored.is_none() {
                return Err(authenticator_error(
                    AuthenticatorErrorKind::Renewal,
                    "Authenticator was already renewed or discarded",
                ));
            }
            repository
                .remove(&authenticator.id)
                .await
                .map_err(|e| e.in_stage(AuthenticatorErrorKind::Renewal))?;
        }

        let renewed = self
            .new_authenticator(authenticator.login_info.clone(), authenticator.fingerprint.clone())
            .await
            .map(|renewed| Authenticator {
                custom_claims: authenticator.custom_claims.clone(),
                ..renewed
            });

        let artifact = match renewed {
            Ok(renewed) => self.init(renewed).await,
            Err(e) => Err(e),
        };

        artifact.map_err(|e| {
            warn!(
                "Renewing {} authenticator for {} failed after the old one was removed: {}",
                self.transport.kind(),
                authenticator.login_info,
                e
            );
            e.in_stage(AuthenticatorErrorKind::Renewal)
        })
    }

    /// Removes the authenticator (when stored) and strips its artifact from the response.
    pub async fn discard(
        &self,
        authenticator: Authenticator,
        response: OutgoingResponse,
    ) -> Result<OutgoingResponse, Error> {
        if let Some(repository) = self.writable_repository(AuthenticatorErrorKind::Discarding)? {
            repository
                .remove(&authenticator.id)
                .await
                .map_err(|e| e.in_stage(AuthenticatorErrorKind::Discarding))?;
        }

        debug!(
            "Discarded {} authenticator for {}",
            self.transport.kind(),
            authenticator.login_info
        );
        Ok(self.transport.discard(response))
    }

    /// [`Authenticator::is_valid`] at the service clock's current time.
    pub fn is_valid(&self, authenticator: &Authenticator) -> bool {
        authenticator.is_valid(self.clock.now())
    }

    async fn new_authenticator(
        &self,
        login_info: LoginInfo,
        fingerprint: Option<String>,
    ) -> Result<Authenticator, Error> {
        let id = self
            .id_generator
            .generate()
            .await
            .map_err(|e| e.in_stage(AuthenticatorErrorKind::Creation))?;
        let now = self.clock.now();
        let expires_at = now.checked_add_signed(self.settings.expiry).ok_or_else(|| {
            authenticator_error(
                AuthenticatorErrorKind::Creation,
                "Authenticator expiry is out of range",
            )
        })?;

        Ok(Authenticator {
            id,
            login_info,
            last_used_at: now,
            expires_at,
            idle_timeout: self.settings.idle_timeout,
            fingerprint,
            custom_claims: None,
        })
    }

    async fn persist_new(
        &self,
        authenticator: &Authenticator,
        stage: AuthenticatorErrorKind,
    ) -> Result<(), Error> {
        if let Some(repository) = self.writable_repository(stage)? {
            repository
                .add(authenticator.clone())
                .await
                .map_err(|e| e.in_stage(stage))?;
        }
        Ok(())
    }

    fn required_repository(
        &self,
        stage: AuthenticatorErrorKind,
    ) -> Result<&Arc<dyn AuthenticatorRepository>, Error> {
        self.repository.as_ref().ok_or_else(|| {
            authenticator_error(
                stage,
                &format!(
                    "{} authenticators need an authenticator repository",
                    self.transport.kind()
                ),
            )
        })
    }

    /// The repository to write to; `None` for self-contained kinds without one.
    fn writable_repository(
        &self,
        stage: AuthenticatorErrorKind,
    ) -> Result<Option<&Arc<dyn AuthenticatorRepository>>, Error> {
        if self.repository.is_none() && self.transport.is_self_contained() {
            return Ok(None);
        }
        self.required_repository(stage).map(Some)
    }

    fn fingerprint(&self, request: &IncomingRequest) -> Option<String> {
        if self.settings.use_fingerprinting && self.transport.supports_fingerprinting() {
            Some(self.fingerprint_generator.generate(request))
        } else {
            None
        }
    }

    fn fingerprint_matches(&self, authenticator: &Authenticator, request: &IncomingRequest) -> bool {
        match (&authenticator.fingerprint, self.fingerprint(request)) {
            (Some(stored), Some(current)) => *stored == current,
            _ => true,
        }
    }
}
