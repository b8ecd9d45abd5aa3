use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};
use tracing::debug;

use super::{ItemStructure, SocialState, StateItemHandler};
use crate::crypto::Signer;
use crate::error::{state_error, Error, ErrorKind, OAuth2StateErrorKind};
use crate::http::{IncomingRequest, OutgoingResponse};

/// Builds, serializes and validates the aggregate OAuth2 state.
///
/// Holds no per-request data; one provider can serve concurrent flows.
#[derive(Clone)]
pub struct SocialStateProvider {
    handlers: Vec<Arc<dyn StateItemHandler>>,
    signer: Arc<dyn Signer>,
}

impl SocialStateProvider {
    /// Name of the query parameter carrying the state.
    pub const STATE_PARAM: &'static str = "state";

    pub fn new(handlers: Vec<Arc<dyn StateItemHandler>>, signer: Arc<dyn Signer>) -> Self {
        Self { handlers, signer }
    }

    /// Returns a new provider with an additional handler.
    ///
    /// A handler with the same id as an existing one replaces it.
    pub fn with_handler(&self, handler: Arc<dyn StateItemHandler>) -> Self {
        let mut handlers: Vec<_> = self
            .handlers
            .iter()
            .filter(|existing| existing.id() != handler.id())
            .cloned()
            .collect();
        handlers.push(handler);
        Self {
            handlers,
            signer: self.signer.clone(),
        }
    }

    pub fn handlers(&self) -> &[Arc<dyn StateItemHandler>] {
        &self.handlers
    }

    pub async fn build(&self, request: &IncomingRequest) -> Result<SocialState, Error> {
        let mut state = SocialState::new();
        for handler in &self.handlers {
            let item = handler.build(request).await?;
            state = state.with_item(handler.id(), item);
        }
        Ok(state)
    }

    /// `sign(base64url(JSON({handler id: item})))`
    pub fn serialize(&self, state: &SocialState) -> String {
        let structures: Map<String, Value> = self
            .handlers
            .iter()
            .filter_map(|handler| state.item(handler.id()).map(|item| handler.serialize(item)))
            .map(|structure| (structure.id, structure.data))
            .collect();

        let json = Value::Object(structures).to_string();
        self.signer.sign(&URL_SAFE_NO_PAD.encode(json))
    }

    /// Lets every publishable handler store its item on the client.
    pub fn publish(&self, response: OutgoingResponse, state: &SocialState) -> OutgoingResponse {
        self.handlers.iter().fold(response, |response, handler| {
            match (handler.publishable(), state.item(handler.id())) {
                (Some(publishable), Some(item)) => publishable.publish(item, response),
                _ => response,
            }
        })
    }

    /// Reads the state from the `state` query parameter.
    ///
    /// Items no registered handler claims are ignored.
    pub fn unserialize(&self, request: &IncomingRequest) -> Result<SocialState, Error> {
        let raw = request.query_param(Self::STATE_PARAM).ok_or_else(|| {
            state_error(
                OAuth2StateErrorKind::ProviderStateDoesNotExist,
                "No state parameter in the callback",
            )
        })?;

        let encoded = self
            .signer
            .extract(raw)
            .map_err(|e| e.into_kind(ErrorKind::OAuth2State(OAuth2StateErrorKind::InvalidSignature)))?;
        let structures: Map<String, Value> = URL_SAFE_NO_PAD
            .decode(&encoded)
            .map_err(Error::from)
            .and_then(|json| serde_json::from_slice(&json).map_err(Error::from))
            .map_err(|e| e.into_kind(ErrorKind::OAuth2State(OAuth2StateErrorKind::Malformed)))?;

        let mut state = SocialState::new();
        for (id, data) in structures {
            let structure = ItemStructure { id, data };
            match self.handlers.iter().find(|handler| handler.can_handle(&structure)) {
                Some(handler) => {
                    let item = handler.unserialize(&structure, request)?;
                    state = state.with_item(structure.id, item);
                }
                None => debug!("Ignoring unknown state item {}", structure.id),
            }
        }
        Ok(state)
    }

    /// Every handler must find its item and validate it.
    pub async fn validate(&self, state: &SocialState, request: &IncomingRequest) -> Result<(), Error> {
        for handler in &self.handlers {
            let item = state.item(handler.id()).ok_or_else(|| {
                state_error(
                    OAuth2StateErrorKind::ItemDoesNotExist(handler.id().to_string()),
                    &format!("State item {} is missing", handler.id()),
                )
            })?;
            if !handler.validate(item, request).await? {
                return Err(state_error(
                    OAuth2StateErrorKind::StateIsNotEqual,
                    &format!("State item {} does not match the client state", handler.id()),
                ));
            }
        }
        Ok(())
    }
}
