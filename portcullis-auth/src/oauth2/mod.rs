//! OAuth2 authorization-code flow: state handling and the generic provider.

mod provider;
pub mod state;

pub use provider::{OAuth2Provider, OAuth2Settings};
pub use state::{
    CsrfStateItemHandler, ItemStructure, Publishable, SocialState, SocialStateProvider, StateItem,
    StateItemHandler, UserStateItemHandler,
};
