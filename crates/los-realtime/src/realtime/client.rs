//! Public handle for one broadcast server connection.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::connection::{connection_loop, LoopContext};
use super::types::{Command, ConnectionState, RealtimeConfig};
use crate::authorizer::ChannelAuthorizer;
use crate::presence::{ChannelSession, PresenceCallbacks, SessionShared};
use crate::RealtimeError;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle to a live connection and its background task.
///
/// Cheap to clone; every clone drives the same socket. The connection is
/// identified by the bearer token it was created with.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    token: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    socket_id: watch::Receiver<Option<String>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Start the background connection. Failures are reported through the
    /// sessions' `error` hooks, never returned here.
    pub fn connect(
        config: RealtimeConfig,
        token: impl Into<String>,
        authorizer: Arc<dyn ChannelAuthorizer>,
    ) -> Self {
        let token = token.into();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (socket_tx, socket_rx) = watch::channel(None);

        let task = tokio::spawn(connection_loop(LoopContext {
            config,
            token: token.clone(),
            authorizer,
            state_tx,
            socket_tx,
            commands: command_rx,
        }));

        Self {
            inner: Arc::new(Inner {
                token,
                commands: command_tx,
                state: state_rx,
                socket_id: socket_rx,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    pub fn token(&self) -> &str {
        &self.inner.token
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Socket id assigned by the server, while open.
    pub fn socket_id(&self) -> Option<String> {
        self.inner.socket_id.borrow().clone()
    }

    /// Wait until the connection reaches `state`.
    ///
    /// Returns `false` if the connection closed without ever reaching it.
    pub async fn wait_for(&self, state: ConnectionState) -> bool {
        let mut rx = self.inner.state.clone();
        let reached = rx.wait_for(|current| *current == state).await.is_ok();
        reached
    }

    /// Join the presence channel `user.<user_id>`.
    ///
    /// Always returns a session; authorization and subscription failures
    /// arrive later through the `error` hook.
    pub fn join(&self, user_id: impl fmt::Display, callbacks: PresenceCallbacks) -> ChannelSession {
        let name = format!("user.{user_id}");
        debug!(channel = %name, "Joining presence channel");
        let shared = Arc::new(SessionShared::new(name, callbacks));
        if self
            .inner
            .commands
            .send(Command::Subscribe(Arc::clone(&shared)))
            .is_err()
        {
            shared.fail(RealtimeError::Transport("connection is closed".into()));
        }
        ChannelSession::new(shared, self.inner.commands.clone())
    }

    /// Close the socket and wait for the background task to finish.
    ///
    /// On return the state is `Closed` and every session has been released.
    pub async fn close(&self) {
        let _ = self.inner.commands.send(Command::Disconnect);
        let handle = self.inner.task.lock().await.take();
        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Connection task ended abnormally");
                }
            }
            // Another caller is already awaiting the task.
            None => {
                self.wait_for(ConnectionState::Closed).await;
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("token", &"[REDACTED]")
            .field("state", &self.state())
            .field("socket_id", &self.socket_id())
            .finish()
    }
}
