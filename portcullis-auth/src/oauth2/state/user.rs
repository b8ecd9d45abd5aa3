use async_trait::async_trait;

use super::{StateItem, StateItemHandler};
use crate::error::Error;
use crate::http::IncomingRequest;

/// Carries caller-supplied data (e.g. the page to return to) through the flow.
///
/// The item is protected by the state signature only; it is never
/// published and always validates.
#[derive(Debug, Clone)]
pub struct UserStateItemHandler {
    item: StateItem,
}

impl UserStateItemHandler {
    pub const ID: &'static str = "user-state";

    pub fn new(item: StateItem) -> Self {
        Self { item }
    }
}

#[async_trait]
impl StateItemHandler for UserStateItemHandler {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn state(&self) -> Result<StateItem, Error> {
        Ok(self.item.clone())
    }

    async fn validate(&self, _item: &StateItem, _request: &IncomingRequest) -> Result<bool, Error> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, OAuth2StateErrorKind};
    use crate::oauth2::state::ItemStructure;
    use serde_json::json;

    #[tokio::test]
    async fn test_build_returns_configured_item() {
        let item = StateItem::from([("redirect".to_string(), "/settings".to_string())]);
        let handler = UserStateItemHandler::new(item.clone());

        assert_eq!(handler.build(&IncomingRequest::new()).await.unwrap(), item);
        assert!(handler.publishable().is_none());
    }

    #[test]
    fn test_unserialize_rejects_non_string_values() {
        let handler = UserStateItemHandler::new(StateItem::new());
        let structure = ItemStructure {
            id: UserStateItemHandler::ID.to_string(),
            data: json!({"redirect": 42}),
        };

        let result = handler.unserialize(&structure, &IncomingRequest::new());
        assert!(matches!(
            result,
            Err(Error {
                error_kind: ErrorKind::OAuth2State(OAuth2StateErrorKind::Malformed),
                ..
            })
        ));
    }
}
