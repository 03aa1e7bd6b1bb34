//! Owner of the single live connection.
//!
//! `EchoManager` is held by the top-level controller rather than stored in a
//! global. Its four entry points (`initialize`, `get`, `disconnect`,
//! `join_presence_channel`) are the whole surface the UI layer uses.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::authorizer::{ChannelAuthorizer, HttpAuthorizer};
use crate::presence::{ChannelSession, PresenceCallbacks};
use crate::realtime::{Connection, ConnectionState, RealtimeConfig};
use crate::RealtimeError;

/// Builds the authorizer for a connection from its bearer token.
pub type AuthorizerFactory = Arc<dyn Fn(&str) -> Arc<dyn ChannelAuthorizer> + Send + Sync>;

pub struct EchoManager {
    config: RealtimeConfig,
    authorizer_factory: AuthorizerFactory,
    current: Option<Connection>,
    disconnected: bool,
}

impl EchoManager {
    /// A manager that authorizes channels against `config.auth_endpoint`.
    pub fn new(config: RealtimeConfig) -> Self {
        let endpoint = config.auth_endpoint.clone();
        Self::with_authorizer_factory(config, move |token| {
            Arc::new(HttpAuthorizer::new(endpoint.clone(), token)) as Arc<dyn ChannelAuthorizer>
        })
    }

    pub fn with_authorizer_factory(
        config: RealtimeConfig,
        factory: impl Fn(&str) -> Arc<dyn ChannelAuthorizer> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            authorizer_factory: Arc::new(factory),
            current: None,
            disconnected: false,
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Open a fresh connection for `token`.
    ///
    /// Any existing connection is fully closed first, even if it was created
    /// with the same token.
    pub async fn initialize(&mut self, token: impl Into<String>) -> Connection {
        if let Some(previous) = self.current.take() {
            info!("Closing previous realtime connection");
            previous.close().await;
        }

        let token = token.into();
        let authorizer = (self.authorizer_factory)(&token);
        let connection = Connection::connect(self.config.clone(), token, authorizer);
        self.current = Some(connection.clone());
        self.disconnected = false;
        connection
    }

    /// The current connection.
    pub fn get(&self) -> Result<Connection, RealtimeError> {
        self.current.clone().ok_or(RealtimeError::NotInitialized)
    }

    /// Close and forget the current connection. No-op when there is none.
    pub async fn disconnect(&mut self) {
        if let Some(connection) = self.current.take() {
            info!("Disconnecting realtime");
            connection.close().await;
            self.disconnected = true;
        }
    }

    pub fn state(&self) -> ConnectionState {
        match &self.current {
            Some(connection) => connection.state(),
            None if self.disconnected => ConnectionState::Closed,
            None => ConnectionState::Uninitialized,
        }
    }

    /// Join `user.<user_id>` on the current connection.
    pub fn join_presence_channel(
        &self,
        user_id: impl fmt::Display,
        callbacks: PresenceCallbacks,
    ) -> Result<ChannelSession, RealtimeError> {
        Ok(self.get()?.join(user_id, callbacks))
    }

    /// Join, initializing a connection for `token` first if none exists.
    pub async fn join_or_initialize(
        &mut self,
        token: impl Into<String>,
        user_id: impl fmt::Display,
        callbacks: PresenceCallbacks,
    ) -> ChannelSession {
        let connection = match self.get() {
            Ok(connection) => connection,
            Err(_) => self.initialize(token).await,
        };
        connection.join(user_id, callbacks)
    }
}

impl fmt::Debug for EchoManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchoManager")
            .field("config", &self.config)
            .field("current", &self.current)
            .field("state", &self.state())
            .finish()
    }
}
