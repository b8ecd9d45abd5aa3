//! Authentication events.
//!
//! This crate lets applications react to authentication outcomes (audit
//! logs, metrics, welcome mails) without the request handlers knowing about
//! those concerns.
//!
//! # Architecture
//!
//! - **AuthEvent**: Enum representing everything that can happen to a login
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates. The login an event is
//! about is carried as a serialized JSON value.

use async_trait::async_trait;
use log::*;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Authentication events emitted by the environment and its request handlers.
///
/// `login_info` is the serialized `LoginInfo` (`{"providerId": ..., "providerKey": ...}`),
/// `path` the path of the request that caused the event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// A user signed in and received a new authenticator.
    Login { login_info: Value, path: String },
    /// A user signed out; the authenticator was discarded.
    Logout { login_info: Value, path: String },
    /// A new identity was created for a login.
    SignUp { login_info: Value, path: String },
    /// A request to a secured handler carried a valid authenticator, or was
    /// authenticated by a request provider.
    Authenticated { login_info: Value, path: String },
    /// A request to a secured handler could not be authenticated.
    NotAuthenticated { path: String },
    /// An authenticator was replaced by a new one for the same login.
    AuthenticatorRenewed { login_info: Value, path: String },
    /// An invalid authenticator, or one whose identity no longer exists, was discarded.
    AuthenticatorDiscarded { login_info: Value, path: String },
}

impl AuthEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::Login { .. } => "login",
            AuthEvent::Logout { .. } => "logout",
            AuthEvent::SignUp { .. } => "sign_up",
            AuthEvent::Authenticated { .. } => "authenticated",
            AuthEvent::NotAuthenticated { .. } => "not_authenticated",
            AuthEvent::AuthenticatorRenewed { .. } => "authenticator_renewed",
            AuthEvent::AuthenticatorDiscarded { .. } => "authenticator_discarded",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            AuthEvent::Login { path, .. }
            | AuthEvent::Logout { path, .. }
            | AuthEvent::SignUp { path, .. }
            | AuthEvent::Authenticated { path, .. }
            | AuthEvent::NotAuthenticated { path }
            | AuthEvent::AuthenticatorRenewed { path, .. }
            | AuthEvent::AuthenticatorDiscarded { path, .. } => path,
        }
    }

    /// `None` for [`AuthEvent::NotAuthenticated`].
    pub fn login_info(&self) -> Option<&Value> {
        match self {
            AuthEvent::Login { login_info, .. }
            | AuthEvent::Logout { login_info, .. }
            | AuthEvent::SignUp { login_info, .. }
            | AuthEvent::Authenticated { login_info, .. }
            | AuthEvent::AuthenticatorRenewed { login_info, .. }
            | AuthEvent::AuthenticatorDiscarded { login_info, .. } => Some(login_info),
            AuthEvent::NotAuthenticated { .. } => None,
        }
    }
}

/// Trait for handling authentication events.
/// Implementations can perform side effects like writing audit logs,
/// updating metrics, sending notifications, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &AuthEvent);
}

/// Writes every event to the log.
///
/// `NotAuthenticated` is logged at debug level, everything else at info.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle(&self, event: &AuthEvent) {
        match event.login_info() {
            Some(login_info) => info!("{} {} on {}", event.name(), login_info, event.path()),
            None => debug!("{} on {}", event.name(), event.path()),
        }
    }
}

/// Publishes authentication events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: AuthEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<AuthEvent>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &AuthEvent) {
            self.events.lock().await.push(event.clone());
        }
    }

    fn login_info() -> Value {
        json!({"providerId": "credentials", "providerKey": "jane@example.com"})
    }

    #[tokio::test]
    async fn test_handlers_receive_events_in_order() {
        let first = Arc::new(RecordingHandler::default());
        let second = Arc::new(RecordingHandler::default());
        let publisher = EventPublisher::new()
            .with_handler(first.clone())
            .with_handler(second.clone())
            .with_handler(Arc::new(LoggingEventHandler));

        publisher
            .publish(AuthEvent::Login {
                login_info: login_info(),
                path: "/login".to_string(),
            })
            .await;
        publisher
            .publish(AuthEvent::NotAuthenticated {
                path: "/admin".to_string(),
            })
            .await;

        let names: Vec<_> = first.events.lock().await.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["login", "not_authenticated"]);
        assert_eq!(second.events.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_with_handler_leaves_original_untouched() {
        let handler = Arc::new(RecordingHandler::default());
        let publisher = EventPublisher::new();
        let _extended = publisher.clone().with_handler(handler.clone());

        publisher
            .publish(AuthEvent::NotAuthenticated {
                path: "/".to_string(),
            })
            .await;
        assert!(handler.events.lock().await.is_empty());
    }

    #[test]
    fn test_accessors_and_serialization() {
        let event = AuthEvent::AuthenticatorDiscarded {
            login_info: login_info(),
            path: "/dashboard".to_string(),
        };
        assert_eq!(event.path(), "/dashboard");
        assert_eq!(event.login_info(), Some(&login_info()));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "authenticator_discarded",
                "login_info": login_info(),
                "path": "/dashboard"
            })
        );

        let event = AuthEvent::NotAuthenticated {
            path: "/".to_string(),
        };
        assert_eq!(event.login_info(), None);
    }
}
