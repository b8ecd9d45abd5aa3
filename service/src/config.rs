use clap::builder::TypedValueParser as _;
use clap::{ArgAction, Parser};
use dotenvy::dotenv;
use log::LevelFilter;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_AUTHENTICATOR_EXPIRY_SECONDS: u64 = 12 * 60 * 60;
pub const DEFAULT_STATE_COOKIE_MAX_AGE_SECONDS: u64 = 5 * 60;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl fmt::Display for RustEnvParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "expected one of development, production, staging")
    }
}

impl Error for RustEnvParseError {}

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .try_map(|s| s.parse::<RustEnv>()),
    )]
    pub runtime_env: RustEnv,

    /// Key for signing cookies, OAuth state and token secrets.
    #[arg(long, env)]
    signer_key: Option<String>,

    /// Key for encrypting session authenticators.
    #[arg(long, env)]
    crypter_key: Option<String>,

    /// Shared secret for signing JWT authenticators.
    #[arg(long, env)]
    jwt_shared_secret: Option<String>,

    /// Issuer (`iss` claim) of JWT authenticators.
    #[arg(long, env, default_value = "portcullis")]
    pub jwt_issuer: String,

    /// Absolute lifetime of an authenticator in seconds (default: 12 hours)
    #[arg(long, env, default_value_t = DEFAULT_AUTHENTICATOR_EXPIRY_SECONDS)]
    pub authenticator_expiry_seconds: u64,

    /// Maximum seconds between two requests before an authenticator times out.
    /// Unset disables the idle timeout.
    #[arg(long, env)]
    pub authenticator_idle_timeout_seconds: Option<u64>,

    /// Bind cookie and session authenticators to the client that created them.
    #[arg(long, env, default_value_t = true, action = ArgAction::Set)]
    pub use_fingerprinting: bool,

    /// Name of the cookie carrying cookie authenticators.
    #[arg(long, env, default_value = "id")]
    pub authenticator_cookie_name: String,

    /// Header (or query parameter) carrying bearer token and JWT authenticators.
    #[arg(long, env, default_value = "X-Auth-Token")]
    pub authenticator_header_name: String,

    /// Session key holding session authenticators.
    #[arg(long, env, default_value = "authenticator")]
    pub authenticator_session_key: String,

    /// Name of the cookie carrying the OAuth2 CSRF token.
    #[arg(long, env, default_value = "OAuth2State")]
    pub oauth2_state_cookie_name: String,

    /// Lifetime of the OAuth2 state and OAuth1 token secret cookies in seconds.
    #[arg(long, env, default_value_t = DEFAULT_STATE_COOKIE_MAX_AGE_SECONDS)]
    pub state_cookie_max_age_seconds: u64,

    /// Domain attribute of all authentication cookies.
    #[arg(long, env)]
    pub cookie_domain: Option<String>,

    /// Path attribute of all authentication cookies.
    #[arg(long, env, default_value = "/")]
    pub cookie_path: String,

    /// Mark authentication cookies `Secure`; only disable for local HTTP development.
    #[arg(long, env, default_value_t = true, action = ArgAction::Set)]
    pub cookie_secure: bool,

    /// Timeout in seconds for requests to OAuth providers
    #[arg(long, env, default_value_t = 30)]
    pub http_timeout_seconds: u64,

    /// Retries of failed requests to OAuth providers, with exponential backoff
    #[arg(long, env, default_value_t = 3)]
    pub http_max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn set_signer_key(mut self, signer_key: String) -> Self {
        self.signer_key = Some(signer_key);
        self
    }

    pub fn signer_key(&self) -> Option<&str> {
        self.signer_key.as_deref()
    }

    pub fn set_crypter_key(mut self, crypter_key: String) -> Self {
        self.crypter_key = Some(crypter_key);
        self
    }

    pub fn crypter_key(&self) -> Option<&str> {
        self.crypter_key.as_deref()
    }

    pub fn set_jwt_shared_secret(mut self, jwt_shared_secret: String) -> Self {
        self.jwt_shared_secret = Some(jwt_shared_secret);
        self
    }

    pub fn jwt_shared_secret(&self) -> Option<&str> {
        self.jwt_shared_secret.as_deref()
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["portcullis"]);

        assert_eq!(config.log_level_filter, LevelFilter::Info);
        assert_eq!(config.authenticator_expiry_seconds, 43200);
        assert_eq!(config.authenticator_idle_timeout_seconds, None);
        assert!(config.use_fingerprinting);
        assert!(config.cookie_secure);
        assert_eq!(config.authenticator_header_name, "X-Auth-Token");
        assert_eq!(config.oauth2_state_cookie_name, "OAuth2State");
        assert_eq!(config.state_cookie_max_age_seconds, 300);
        assert_eq!(config.signer_key(), None);
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::parse_from([
            "portcullis",
            "--log-level-filter",
            "DEBUG",
            "--runtime-env",
            "production",
            "--authenticator-idle-timeout-seconds",
            "1800",
            "--use-fingerprinting",
            "false",
            "--signer-key",
            "signer-secret",
        ]);

        assert_eq!(config.log_level_filter, LevelFilter::Debug);
        assert!(config.is_production());
        assert_eq!(config.authenticator_idle_timeout_seconds, Some(1800));
        assert!(!config.use_fingerprinting);
        assert_eq!(config.signer_key(), Some("signer-secret"));
    }

    #[test]
    fn test_unknown_runtime_env_is_rejected() {
        assert_eq!("test".parse::<RustEnv>(), Err(RustEnvParseError));
        assert!(Config::try_parse_from(["portcullis", "--runtime-env", "test"]).is_err());
    }

    #[test]
    fn test_secret_setters() {
        let config = Config::parse_from(["portcullis"])
            .set_crypter_key("crypter-secret".to_string())
            .set_jwt_shared_secret("jwt-secret".to_string());

        assert_eq!(config.crypter_key(), Some("crypter-secret"));
        assert_eq!(config.jwt_shared_secret(), Some("jwt-secret"));
    }
}
