//! Identity keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a user within the namespace of one provider.
///
/// This is the join key between providers and the application's own identity storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInfo {
    /// Provider that authenticated the user (`credentials`, `google`, ...).
    pub provider_id: String,
    /// The user's key at that provider (email, provider user id, ...).
    pub provider_key: String,
}

impl LoginInfo {
    pub fn new(provider_id: impl Into<String>, provider_key: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            provider_key: provider_key.into(),
        }
    }
}

impl fmt::Display for LoginInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.provider_id, self.provider_key)
    }
}
