//! Builds the authentication components from a [`service::config::Config`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use log::*;
use portcullis_auth::authenticator::{
    AuthenticatorRepository, AuthenticatorService, AuthenticatorSettings, BearerTokenSettings,
    BearerTokenAuthenticatorService, BearerTokenTransport, CookieAuthenticatorService,
    CookieTransport, CrypterAuthenticatorEncoder, JwtAuthenticatorService, JwtSettings,
    JwtTransport, RequestPart, SessionAuthenticatorService, SessionTransport,
};
use portcullis_auth::crypto::{AesGcmCrypter, Crypter, HmacSigner, HmacSignerSettings, Signer};
use portcullis_auth::error::{crypto_error, CryptoErrorKind, Error};
use portcullis_auth::http::{CookieSettings, HttpClient, HttpClientBuilder};
use portcullis_auth::oauth1::CookieSecretProvider;
use portcullis_auth::oauth2::{CsrfStateItemHandler, SocialStateProvider, StateItemHandler};
use portcullis_auth::util::SecureRandomIdGenerator;
use secrecy::SecretString;
use service::config::Config;

fn required_secret(value: Option<&str>, name: &str) -> Result<SecretString, Error> {
    match value {
        Some(value) if !value.is_empty() => Ok(SecretString::from(value.to_string())),
        _ => Err(crypto_error(
            CryptoErrorKind::InvalidKey,
            &format!("No {} configured", name),
        )),
    }
}

fn seconds(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

pub fn authenticator_settings(config: &Config) -> AuthenticatorSettings {
    AuthenticatorSettings {
        expiry: seconds(config.authenticator_expiry_seconds),
        idle_timeout: config.authenticator_idle_timeout_seconds.map(seconds),
        use_fingerprinting: config.use_fingerprinting,
    }
}

pub fn signer(config: &Config) -> Result<Arc<dyn Signer>, Error> {
    let key = required_secret(config.signer_key(), "signer key")?;
    Ok(Arc::new(HmacSigner::new(HmacSignerSettings::new(key))))
}

pub fn crypter(config: &Config) -> Result<Arc<dyn Crypter>, Error> {
    let key = required_secret(config.crypter_key(), "crypter key")?;
    Ok(Arc::new(AesGcmCrypter::new(&key)))
}

/// Shape of a cookie named `name`, with domain, path and `Secure` from the config.
pub fn cookie_settings(config: &Config, name: &str) -> CookieSettings {
    let mut settings = CookieSettings::named(name);
    settings.domain = config.cookie_domain.clone();
    settings.path = config.cookie_path.clone();
    settings.secure = config.cookie_secure;
    settings
}

pub fn cookie_authenticator_service(
    config: &Config,
    repository: Arc<dyn AuthenticatorRepository>,
) -> Result<CookieAuthenticatorService, Error> {
    let transport = CookieTransport::new(
        cookie_settings(config, &config.authenticator_cookie_name),
        signer(config)?,
    );
    Ok(AuthenticatorService::builder(transport)
        .with_settings(authenticator_settings(config))
        .with_repository(repository)
        .build())
}

/// Session authenticators are encrypted, so the session store never sees the login in clear.
pub fn session_authenticator_service(config: &Config) -> Result<SessionAuthenticatorService, Error> {
    let transport = SessionTransport::new(
        config.authenticator_session_key.clone(),
        signer(config)?,
        Arc::new(CrypterAuthenticatorEncoder::new(crypter(config)?)),
    );
    Ok(AuthenticatorService::builder(transport)
        .with_settings(authenticator_settings(config))
        .build())
}

pub fn bearer_token_authenticator_service(
    config: &Config,
    repository: Arc<dyn AuthenticatorRepository>,
) -> BearerTokenAuthenticatorService {
    let transport = BearerTokenTransport::new(BearerTokenSettings {
        field_name: config.authenticator_header_name.clone(),
        request_parts: vec![RequestPart::Headers],
    });
    AuthenticatorService::builder(transport)
        .with_settings(authenticator_settings(config))
        .with_repository(repository)
        .build()
}

/// Without a repository JWT authenticators cannot be revoked before they expire.
pub fn jwt_authenticator_service(
    config: &Config,
    repository: Option<Arc<dyn AuthenticatorRepository>>,
) -> Result<JwtAuthenticatorService, Error> {
    let mut settings = JwtSettings::new(required_secret(
        config.jwt_shared_secret(),
        "JWT shared secret",
    )?);
    settings.field_name = config.authenticator_header_name.clone();
    settings.issuer = config.jwt_issuer.clone();

    let transport = JwtTransport::new(
        settings,
        Arc::new(CrypterAuthenticatorEncoder::new(crypter(config)?)),
    );
    let builder = AuthenticatorService::builder(transport).with_settings(authenticator_settings(config));
    Ok(match repository {
        Some(repository) => builder.with_repository(repository).build(),
        None => {
            info!("JWT authenticators are not stored and cannot be revoked");
            builder.build()
        }
    })
}

/// OAuth2 state provider with the CSRF handler.
pub fn social_state_provider(config: &Config) -> Result<SocialStateProvider, Error> {
    let signer = signer(config)?;
    let csrf: Arc<dyn StateItemHandler> = Arc::new(CsrfStateItemHandler::new(
        cookie_settings(config, &config.oauth2_state_cookie_name)
            .with_max_age(seconds(config.state_cookie_max_age_seconds)),
        Arc::new(SecureRandomIdGenerator::new(32)),
        signer.clone(),
    ));
    Ok(SocialStateProvider::new(vec![csrf], signer))
}

pub fn oauth1_secret_provider(config: &Config) -> Result<CookieSecretProvider, Error> {
    Ok(CookieSecretProvider::new(
        cookie_settings(config, CookieSecretProvider::DEFAULT_COOKIE_NAME)
            .with_max_age(seconds(config.state_cookie_max_age_seconds)),
        signer(config)?,
        crypter(config)?,
    ))
}

pub fn http_client(config: &Config) -> Result<HttpClient, Error> {
    Ok(HttpClientBuilder::new()
        .with_timeout(StdDuration::from_secs(config.http_timeout_seconds))
        .with_max_retries(config.http_max_retries)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use portcullis_auth::error::ErrorKind;
    use portcullis_auth::http::{IncomingRequest, OutgoingResponse};
    use portcullis_auth::oauth2::SocialState;

    fn config() -> Config {
        Config::parse_from([
            "portcullis",
            "--authenticator-idle-timeout-seconds",
            "600",
            "--cookie-domain",
            "example.com",
        ])
        .set_signer_key("signer-secret".to_string())
        .set_crypter_key("crypter-secret".to_string())
        .set_jwt_shared_secret("jwt-secret".to_string())
    }

    #[test]
    fn test_authenticator_settings() {
        let settings = authenticator_settings(&config());
        assert_eq!(settings.expiry, Duration::hours(12));
        assert_eq!(settings.idle_timeout, Some(Duration::minutes(10)));
        assert!(settings.use_fingerprinting);
    }

    #[test]
    fn test_missing_keys_are_reported() {
        let config = Config::parse_from(["portcullis"]);
        let result = signer(&config);
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::Crypto(CryptoErrorKind::InvalidKey),
                ..
            })
        ));
        assert!(session_authenticator_service(&config).is_err());
        assert!(jwt_authenticator_service(&config, None).is_err());
    }

    #[test]
    fn test_cookie_settings_follow_config() {
        let settings = cookie_settings(&config(), "id");
        assert_eq!(settings.domain.as_deref(), Some("example.com"));
        assert!(settings.secure);
    }

    #[test]
    fn test_services_build() {
        let config = config();
        assert!(session_authenticator_service(&config).is_ok());
        assert!(jwt_authenticator_service(&config, None).is_ok());
        assert!(http_client(&config).is_ok());
    }

    #[tokio::test]
    async fn test_state_cookie_uses_configured_name() {
        let provider = social_state_provider(&config()).unwrap();
        let state: SocialState = provider.build(&IncomingRequest::new()).await.unwrap();
        let response = provider.publish(OutgoingResponse::ok(), &state);

        let cookie = response.cookie("OAuth2State").unwrap();
        assert_eq!(cookie.max_age, Some(Duration::minutes(5)));
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
    }
}
