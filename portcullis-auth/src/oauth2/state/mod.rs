//! OAuth2 state: what the client carries through the authorization redirect.
//!
//! The state is an aggregate of items, one per registered [`StateItemHandler`].
//! It travels signed in the `state` query parameter; handlers that need an
//! out-of-band copy (CSRF) also publish a cookie, and compare both halves
//! when the provider calls back.

mod csrf;
mod provider;
mod user;

pub use csrf::CsrfStateItemHandler;
pub use provider::SocialStateProvider;
pub use user::UserStateItemHandler;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{state_error, Error, OAuth2StateErrorKind};
use crate::http::{IncomingRequest, OutgoingResponse};

/// One handler's slice of the state.
pub type StateItem = BTreeMap<String, String>;

/// A state item tagged with the id of the handler that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStructure {
    pub id: String,
    pub data: Value,
}

/// Handles one named slice of the OAuth2 state.
#[async_trait]
pub trait StateItemHandler: Send + Sync {
    /// Unique key of this handler's slice in the aggregate state.
    fn id(&self) -> &str;

    /// The handler's current item.
    async fn state(&self) -> Result<StateItem, Error>;

    /// A fresh item for an authorization request.
    async fn build(&self, _request: &IncomingRequest) -> Result<StateItem, Error> {
        self.state().await
    }

    fn serialize(&self, item: &StateItem) -> ItemStructure {
        ItemStructure {
            id: self.id().to_string(),
            data: Value::Object(
                item.iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect(),
            ),
        }
    }

    fn can_handle(&self, structure: &ItemStructure) -> bool {
        structure.id == self.id()
    }

    /// Fails with `OAuth2State(Malformed)` if the data is not a string map.
    fn unserialize(
        &self,
        structure: &ItemStructure,
        _request: &IncomingRequest,
    ) -> Result<StateItem, Error> {
        serde_json::from_value(structure.data.clone()).map_err(|e| {
            state_error(
                OAuth2StateErrorKind::Malformed,
                &format!("Cannot read the {} state item: {}", structure.id, e),
            )
        })
    }

    /// Whether the item round-tripped intact.
    async fn validate(&self, item: &StateItem, request: &IncomingRequest) -> Result<bool, Error>;

    /// Set for handlers that keep a copy of their item on the client.
    fn publishable(&self) -> Option<&dyn Publishable> {
        None
    }
}

/// A handler that stores its item out-of-band in the response.
pub trait Publishable: Send + Sync {
    fn publish(&self, item: &StateItem, response: OutgoingResponse) -> OutgoingResponse;
}

/// The aggregate state: handler id → item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocialState {
    items: BTreeMap<String, StateItem>,
}

impl SocialState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, handler_id: impl Into<String>, item: StateItem) -> Self {
        self.items.insert(handler_id.into(), item);
        self
    }

    pub fn item(&self, handler_id: &str) -> Option<&StateItem> {
        self.items.get(handler_id)
    }

    pub fn items(&self) -> &BTreeMap<String, StateItem> {
        &self.items
    }

    /// The caller-supplied item set with [`UserStateItemHandler`], if any.
    pub fn user_state(&self) -> Option<&StateItem> {
        self.item(UserStateItemHandler::ID)
    }
}
