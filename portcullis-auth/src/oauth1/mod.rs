//! OAuth1 three-legged flow with HMAC-SHA1 signed requests.

mod provider;
mod secret;
mod signature;

pub use provider::{OAuth1Provider, OAuth1Settings};
pub use secret::CookieSecretProvider;
