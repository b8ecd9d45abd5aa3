//! Turning a provider's profile response into a [`CommonSocialProfile`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{authentication_error, AuthenticationErrorKind, Error};
use crate::login::LoginInfo;

/// The profile fields most social providers return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonSocialProfile {
    pub login_info: LoginInfo,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Parses a provider's profile JSON.
pub trait ProfileParser: Send + Sync {
    fn parse(&self, provider_id: &str, content: &Value) -> Result<CommonSocialProfile, Error>;
}

/// Reads each profile field from a configurable JSON pointer (RFC 6901).
///
/// Covers most providers through configuration alone, e.g. for a provider
/// that nests its data: `JsonPointerProfileParser::default().with_id("/data/id")`.
#[derive(Debug, Clone)]
pub struct JsonPointerProfileParser {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl Default for JsonPointerProfileParser {
    fn default() -> Self {
        Self {
            id: "/id".to_string(),
            first_name: Some("/first_name".to_string()),
            last_name: Some("/last_name".to_string()),
            full_name: Some("/name".to_string()),
            email: Some("/email".to_string()),
            avatar_url: Some("/picture".to_string()),
        }
    }
}

impl JsonPointerProfileParser {
    pub fn with_id(mut self, pointer: impl Into<String>) -> Self {
        self.id = pointer.into();
        self
    }

    pub fn with_first_name(mut self, pointer: impl Into<String>) -> Self {
        self.first_name = Some(pointer.into());
        self
    }

    pub fn with_last_name(mut self, pointer: impl Into<String>) -> Self {
        self.last_name = Some(pointer.into());
        self
    }

    pub fn with_full_name(mut self, pointer: impl Into<String>) -> Self {
        self.full_name = Some(pointer.into());
        self
    }

    pub fn with_email(mut self, pointer: impl Into<String>) -> Self {
        self.email = Some(pointer.into());
        self
    }

    pub fn with_avatar_url(mut self, pointer: impl Into<String>) -> Self {
        self.avatar_url = Some(pointer.into());
        self
    }

    fn field(content: &Value, pointer: &Option<String>) -> Option<String> {
        pointer
            .as_deref()
            .and_then(|pointer| content.pointer(pointer))
            .and_then(scalar_to_string)
    }
}

impl ProfileParser for JsonPointerProfileParser {
    fn parse(&self, provider_id: &str, content: &Value) -> Result<CommonSocialProfile, Error> {
        let id = content
            .pointer(&self.id)
            .and_then(scalar_to_string)
            .ok_or_else(|| {
                authentication_error(
                    AuthenticationErrorKind::ProfileRetrieval,
                    &format!("No user id at {} in the {} profile", self.id, provider_id),
                )
            })?;

        Ok(CommonSocialProfile {
            login_info: LoginInfo::new(provider_id, id),
            first_name: Self::field(content, &self.first_name),
            last_name: Self::field(content, &self.last_name),
            full_name: Self::field(content, &self.full_name),
            email: Self::field(content, &self.email),
            avatar_url: Self::field(content, &self.avatar_url),
        })
    }
}

/// Strings as they are, numbers (numeric ids) rendered; anything else is absent.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
