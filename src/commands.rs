//! Admin subcommands of the `portcullis` binary.

use std::sync::Arc;

use clap::Subcommand;
use portcullis_auth::crypto::Signer;
use portcullis_auth::http::IncomingRequest;
use portcullis_auth::oauth2::{SocialStateProvider, StateItem, UserStateItemHandler};
use portcullis_auth::password::{PasswordHasher, PasswordHasherRegistry};
use portcullis_auth::Error;
use service::config::Config;

use crate::factory;

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Hash a password with the current hasher and print the stored form as JSON
    HashPassword { password: String },
    /// Sign a value with the configured signer key
    Sign { data: String },
    /// Verify a signed value and print the data it carries
    Verify { message: String },
    /// Verify an OAuth2 state parameter and print its items
    DecodeState { state: String },
}

impl Command {
    /// Runs the command; the returned text goes to stdout.
    pub async fn run(&self, config: &Config) -> Result<String, Error> {
        match self {
            Command::HashPassword { password } => {
                let info = PasswordHasherRegistry::default().current().hash(password);
                Ok(serde_json::to_string_pretty(&info)?)
            }
            Command::Sign { data } => Ok(factory::signer(config)?.sign(data)),
            Command::Verify { message } => factory::signer(config)?.extract(message),
            Command::DecodeState { state } => {
                let provider = state_provider(config)?;
                let request =
                    IncomingRequest::new().with_query_param(SocialStateProvider::STATE_PARAM, state);
                let decoded = provider.unserialize(&request)?;
                Ok(serde_json::to_string_pretty(decoded.items())?)
            }
        }
    }
}

/// The configured state provider, also able to read user state items.
fn state_provider(config: &Config) -> Result<SocialStateProvider, Error> {
    Ok(factory::social_state_provider(config)?
        .with_handler(Arc::new(UserStateItemHandler::new(StateItem::new()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use portcullis_auth::auth_info::PasswordInfo;
    use portcullis_auth::error::{ErrorKind, OAuth2StateErrorKind};
    use portcullis_auth::password::PasswordAuthHasher;
    use serde_json::Value;

    fn config() -> Config {
        Config::parse_from(["portcullis"]).set_signer_key("signer-secret".to_string())
    }

    #[tokio::test]
    async fn test_hash_password_prints_password_info() {
        let output = Command::HashPassword {
            password: "s3cret".to_string(),
        }
        .run(&config())
        .await
        .unwrap();

        let info: PasswordInfo = serde_json::from_str(&output).unwrap();
        assert_eq!(info.hasher, PasswordAuthHasher::ID);
        assert!(PasswordAuthHasher.matches(&info, "s3cret"));
    }

    #[tokio::test]
    async fn test_sign_then_verify() {
        let config = config();
        let signed = Command::Sign {
            data: "hello".to_string(),
        }
        .run(&config)
        .await
        .unwrap();
        assert!(signed.starts_with("1-"));

        let verified = Command::Verify { message: signed }.run(&config).await.unwrap();
        assert_eq!(verified, "hello");
    }

    #[tokio::test]
    async fn test_verify_rejects_other_key() {
        let signed = Command::Sign {
            data: "hello".to_string(),
        }
        .run(&config())
        .await
        .unwrap();

        let other = Config::parse_from(["portcullis"]).set_signer_key("other".to_string());
        assert!(Command::Verify { message: signed }.run(&other).await.is_err());
    }

    #[tokio::test]
    async fn test_decode_state_prints_items() {
        let config = config();
        let mut user_state = StateItem::new();
        user_state.insert("return_to".to_string(), "/dashboard".to_string());
        let provider = factory::social_state_provider(&config)
            .unwrap()
            .with_handler(Arc::new(UserStateItemHandler::new(user_state)));
        let state = provider.build(&IncomingRequest::new()).await.unwrap();
        let serialized = provider.serialize(&state);

        let output = Command::DecodeState { state: serialized }
            .run(&config)
            .await
            .unwrap();

        let items: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(items["user-state"]["return_to"], "/dashboard");
        assert!(items.get("csrf-state").is_some());
    }

    #[tokio::test]
    async fn test_decode_state_rejects_tampering() {
        let result = Command::DecodeState {
            state: "1-00-e30".to_string(),
        }
        .run(&config())
        .await;

        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::OAuth2State(OAuth2StateErrorKind::InvalidSignature),
                ..
            })
        ));
    }
}
