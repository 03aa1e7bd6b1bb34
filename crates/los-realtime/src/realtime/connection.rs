//! Background WebSocket connection loop with auto-reconnect.
//!
//! One task owns the socket and the channel registry. Handles talk to it over
//! an unbounded command channel; authorization requests run on a `JoinSet`
//! beside the read loop so a slow endpoint never stalls frame delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::handler::{handle_message, HandlerAction};
use super::types::{build_request, pusher, Command, ConnectionState, PusherMessage, RealtimeConfig};
use crate::authorizer::{AuthorizationGrant, ChannelAuthorizer};
use crate::presence::SessionShared;
use crate::protocol::events;
use crate::RealtimeError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, WsMessage>;
type WsRead = SplitStream<WsStream>;

/// How long a graceful close waits for the server's close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Exponential reconnect delay, reset once a connection is established.
#[derive(Debug)]
pub(crate) struct Backoff {
    base: u64,
    max: u64,
    current: u64,
}

impl Backoff {
    pub(crate) fn new(base: u64, max: u64) -> Self {
        Self {
            base,
            max: max.max(base),
            current: base,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.base;
    }

    /// Delay to wait now; doubles the next one.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current.saturating_mul(2)).min(self.max);
        Duration::from_secs(delay)
    }
}

// ---------------------------------------------------------------------------
// Loop State
// ---------------------------------------------------------------------------

/// Why a socket session ended.
#[derive(Debug)]
enum SessionEnd {
    /// A handle asked to disconnect.
    Disconnect,
    /// The server refused the application; do not retry.
    Fatal(String),
    /// The socket dropped or could not be opened.
    Lost { reason: String, immediate: bool },
}

struct AuthOutcome {
    session: Arc<SessionShared>,
    socket_id: String,
    result: Result<AuthorizationGrant, RealtimeError>,
}

pub(crate) struct LoopContext {
    pub(crate) config: RealtimeConfig,
    pub(crate) token: String,
    pub(crate) authorizer: Arc<dyn ChannelAuthorizer>,
    pub(crate) state_tx: watch::Sender<ConnectionState>,
    pub(crate) socket_tx: watch::Sender<Option<String>>,
    pub(crate) commands: mpsc::UnboundedReceiver<Command>,
}

struct ConnectionTask {
    ctx: LoopContext,
    /// Registered sessions keyed by wire channel name.
    channels: HashMap<String, Arc<SessionShared>>,
    event_names: Vec<String>,
    backoff: Backoff,
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Background task managing the WebSocket connection with auto-reconnect.
///
/// Returns once a handle disconnects, every handle is gone, or the server
/// reports a fatal error. On return the state is `Closed` and every session
/// has been released.
pub(crate) async fn connection_loop(ctx: LoopContext) {
    let event_names = ctx.config.event_names(events::SEND_UPDATE);
    let backoff = Backoff::new(
        ctx.config.reconnect_delay_secs,
        ctx.config.max_reconnect_delay_secs,
    );
    let mut task = ConnectionTask {
        ctx,
        channels: HashMap::new(),
        event_names,
        backoff,
    };
    task.run().await;
}

impl ConnectionTask {
    async fn run(&mut self) {
        loop {
            self.ctx.state_tx.send_replace(ConnectionState::Connecting);
            self.ctx.socket_tx.send_replace(None);

            let end = match self.connect().await {
                Ok(ws) => self.run_session(ws).await,
                Err(end) => end,
            };

            match end {
                SessionEnd::Disconnect => break,
                SessionEnd::Fatal(reason) => {
                    error!(reason = %reason, "Broadcast server refused connection");
                    self.fail_sessions(&reason);
                    break;
                }
                SessionEnd::Lost { reason, immediate } => {
                    self.fail_sessions(&reason);
                    if immediate {
                        self.backoff.reset();
                        continue;
                    }
                    let delay = self.backoff.next_delay();
                    info!(delay = delay.as_secs(), "Reconnecting in {} seconds", delay.as_secs());
                    if !self.wait_offline(delay).await {
                        break;
                    }
                }
            }
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        // Joins racing the shutdown must still hear about it.
        self.ctx.commands.close();
        while let Ok(cmd) = self.ctx.commands.try_recv() {
            if let Command::Subscribe(session) = cmd {
                session.fail(RealtimeError::Transport("connection is closed".into()));
                session.release();
            }
        }
        for (_, session) in self.channels.drain() {
            session.release();
        }
        self.ctx.socket_tx.send_replace(None);
        self.ctx.state_tx.send_replace(ConnectionState::Closed);
        info!("Realtime connection closed");
    }

    /// Dial the server, still serving commands while the handshake runs.
    async fn connect(&mut self) -> Result<WsStream, SessionEnd> {
        let url = self.ctx.config.ws_url();
        info!(url = %url.split('?').next().unwrap_or(""), "Connecting to broadcast server");

        let request = build_request(&url, &self.ctx.token).map_err(|e| SessionEnd::Fatal(e.to_string()))?;
        let timeout = self.ctx.config.connect_timeout();
        let connecting = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request));
        tokio::pin!(connecting);

        loop {
            tokio::select! {
                result = &mut connecting => {
                    return match result {
                        Ok(Ok((ws, _))) => Ok(ws),
                        Ok(Err(e)) => {
                            warn!(error = %e, "Failed to connect to broadcast server");
                            Err(SessionEnd::Lost { reason: format!("connection failed: {e}"), immediate: false })
                        }
                        Err(_elapsed) => {
                            warn!(secs = timeout.as_secs(), "WebSocket connection timed out");
                            Err(SessionEnd::Lost {
                                reason: format!("connection timed out after {}s", timeout.as_secs()),
                                immediate: false,
                            })
                        }
                    };
                }
                cmd = self.ctx.commands.recv() => {
                    if !self.handle_offline(cmd) {
                        return Err(SessionEnd::Disconnect);
                    }
                }
            }
        }
    }

    /// Sleep out a reconnect delay. Returns `false` if told to disconnect.
    async fn wait_offline(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                cmd = self.ctx.commands.recv() => {
                    if !self.handle_offline(cmd) {
                        return false;
                    }
                }
            }
        }
    }

    /// Apply a command while no socket is open. Returns `false` to stop.
    fn handle_offline(&mut self, cmd: Option<Command>) -> bool {
        match cmd {
            Some(Command::Subscribe(session)) => {
                self.register(session);
                true
            }
            Some(Command::Unsubscribe(session)) => {
                self.unregister(&session);
                true
            }
            Some(Command::Disconnect) | None => false,
        }
    }

    /// Track `session`, replacing (and releasing) any previous session for
    /// the same channel. Returns the replaced session.
    fn register(&mut self, session: Arc<SessionShared>) -> Option<Arc<SessionShared>> {
        let previous = self
            .channels
            .insert(session.wire_name().to_string(), Arc::clone(&session))?;
        if Arc::ptr_eq(&previous, &session) {
            return None;
        }
        debug!(channel = %session.name(), "Replacing existing session");
        previous.release();
        Some(previous)
    }

    /// Forget `session` if it is still the registered one for its channel.
    fn unregister(&mut self, session: &Arc<SessionShared>) -> bool {
        match self.channels.get(session.wire_name()) {
            Some(current) if Arc::ptr_eq(current, session) => {
                self.channels.remove(session.wire_name());
                true
            }
            _ => false,
        }
    }

    fn fail_sessions(&self, reason: &str) {
        for session in self.channels.values() {
            session.fail(RealtimeError::Transport(reason.to_string()));
        }
    }

    fn spawn_authorization(
        &self,
        auths: &mut JoinSet<AuthOutcome>,
        socket_id: &str,
        session: Arc<SessionShared>,
    ) {
        let authorizer = Arc::clone(&self.ctx.authorizer);
        let socket_id = socket_id.to_string();
        auths.spawn(async move {
            let result = authorizer.authorize(&socket_id, session.wire_name()).await;
            AuthOutcome {
                session,
                socket_id,
                result,
            }
        });
    }

    // -----------------------------------------------------------------------
    // Socket Session
    // -----------------------------------------------------------------------

    async fn run_session(&mut self, ws: WsStream) -> SessionEnd {
        let (mut write, mut read) = ws.split();
        let mut socket_id: Option<String> = None;
        let mut auths: JoinSet<AuthOutcome> = JoinSet::new();
        let mut activity = self.ctx.config.activity_timeout();
        let mut deadline = Instant::now() + activity;
        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                frame = read.next() => {
                    deadline = Instant::now() + activity;
                    awaiting_pong = false;

                    let text = match frame {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(frame))) => {
                            info!(?frame, "Broadcast server closed connection");
                            return SessionEnd::Lost { reason: "closed by server".into(), immediate: false };
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            return SessionEnd::Lost { reason: e.to_string(), immediate: false };
                        }
                        None => {
                            return SessionEnd::Lost { reason: "connection ended".into(), immediate: false };
                        }
                    };

                    let msg = match serde_json::from_str::<PusherMessage>(&text) {
                        Ok(msg) => msg,
                        Err(_) => {
                            debug!(text = %text.as_str(), "Unrecognized frame");
                            continue;
                        }
                    };

                    match handle_message(&msg, &self.channels, &self.event_names) {
                        HandlerAction::None => {}
                        HandlerAction::Established { socket_id: id, activity_timeout } => {
                            if let Some(secs) = activity_timeout {
                                activity = Duration::from_secs(secs.min(self.ctx.config.activity_timeout_secs).max(1));
                                deadline = Instant::now() + activity;
                            }
                            info!(socket_id = %id, "Connected to broadcast server");
                            self.backoff.reset();
                            self.ctx.socket_tx.send_replace(Some(id.clone()));
                            self.ctx.state_tx.send_replace(ConnectionState::Open);
                            for session in self.channels.values() {
                                session.reset_pending();
                                self.spawn_authorization(&mut auths, &id, Arc::clone(session));
                            }
                            socket_id = Some(id);
                        }
                        HandlerAction::Ping => {
                            if let Err(reason) = send(&mut write, &PusherMessage::new(pusher::PONG, json!({}))).await {
                                return SessionEnd::Lost { reason, immediate: false };
                            }
                        }
                        HandlerAction::ServerError { code, message } => match code {
                            Some(4000..=4099) => return SessionEnd::Fatal(format!("{message} ({code:?})")),
                            Some(4100..=4199) => {
                                warn!(?code, error = %message, "Server asked to reconnect later");
                                return SessionEnd::Lost { reason: message, immediate: false };
                            }
                            Some(4200..=4299) => {
                                warn!(?code, error = %message, "Server asked to reconnect");
                                return SessionEnd::Lost { reason: message, immediate: true };
                            }
                            _ => warn!(?code, error = %message, "Broadcast server error"),
                        },
                    }
                }

                cmd = self.ctx.commands.recv() => match cmd {
                    Some(Command::Subscribe(session)) => {
                        let replaced = self.register(Arc::clone(&session));
                        if let Some(id) = socket_id.as_deref() {
                            if let Some(previous) = replaced {
                                if let Err(reason) = send(&mut write, &unsubscribe_frame(&previous)).await {
                                    return SessionEnd::Lost { reason, immediate: false };
                                }
                            }
                            self.spawn_authorization(&mut auths, id, session);
                        }
                    }
                    Some(Command::Unsubscribe(session)) => {
                        if self.unregister(&session) && socket_id.is_some() {
                            debug!(channel = %session.name(), "Leaving channel");
                            if let Err(reason) = send(&mut write, &unsubscribe_frame(&session)).await {
                                return SessionEnd::Lost { reason, immediate: false };
                            }
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        close_gracefully(&mut write, &mut read).await;
                        return SessionEnd::Disconnect;
                    }
                },

                Some(joined) = auths.join_next(), if !auths.is_empty() => {
                    let outcome = match joined {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(error = %e, "Authorization task failed");
                            continue;
                        }
                    };
                    if let Some(frame) = self.complete_authorization(outcome, socket_id.as_deref()) {
                        if let Err(reason) = send(&mut write, &frame).await {
                            return SessionEnd::Lost { reason, immediate: false };
                        }
                    }
                }

                _ = tokio::time::sleep_until(deadline) => {
                    if awaiting_pong {
                        warn!("No response to ping; connection presumed lost");
                        return SessionEnd::Lost { reason: "activity timeout".into(), immediate: false };
                    }
                    if let Err(reason) = send(&mut write, &PusherMessage::new(pusher::PING, json!({}))).await {
                        return SessionEnd::Lost { reason, immediate: false };
                    }
                    awaiting_pong = true;
                    deadline = Instant::now() + self.ctx.config.pong_timeout();
                }
            }
        }
    }

    /// Turn a finished authorization into a subscribe frame, or report the
    /// failure. Grants for released sessions or stale sockets are dropped.
    fn complete_authorization(
        &self,
        outcome: AuthOutcome,
        current_socket: Option<&str>,
    ) -> Option<PusherMessage> {
        let AuthOutcome {
            session,
            socket_id,
            result,
        } = outcome;

        let registered = self
            .channels
            .get(session.wire_name())
            .is_some_and(|current| Arc::ptr_eq(current, &session));
        if !registered || !session.is_active() || current_socket != Some(socket_id.as_str()) {
            debug!(channel = %session.name(), "Discarding stale authorization");
            return None;
        }

        match result {
            Ok(grant) => {
                debug!(channel = %session.name(), "Subscribing");
                Some(PusherMessage::new(
                    pusher::SUBSCRIBE,
                    grant.subscribe_data(session.wire_name()),
                ))
            }
            Err(e) => {
                warn!(channel = %session.name(), error = %e, "Channel authorization failed");
                session.fail(e);
                None
            }
        }
    }
}

fn unsubscribe_frame(session: &SessionShared) -> PusherMessage {
    PusherMessage::new(
        pusher::UNSUBSCRIBE,
        json!({ "channel": session.wire_name() }),
    )
}

async fn send(write: &mut WsWrite, msg: &PusherMessage) -> Result<(), String> {
    let text = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    write.send(WsMessage::Text(text.into())).await.map_err(|e| {
        warn!(error = %e, "Failed to send frame");
        e.to_string()
    })
}

/// Send a close frame and give the server a moment to acknowledge it.
async fn close_gracefully(write: &mut WsWrite, read: &mut WsRead) {
    if write.send(WsMessage::Close(None)).await.is_err() {
        return;
    }
    let drain = async {
        while let Some(Ok(frame)) = read.next().await {
            if frame.is_close() {
                break;
            }
        }
    };
    if tokio::time::timeout(CLOSE_GRACE, drain).await.is_err() {
        debug!("Server did not acknowledge close");
    }
}
