//! In-process Pusher-protocol server for connection tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;

use crate::authorizer::{AuthorizationGrant, ChannelAuthorizer};
use crate::RealtimeError;

pub(crate) const WAIT: Duration = Duration::from_secs(5);

enum Outgoing {
    Frame(String),
    Close,
}

/// Accepts socket connections and hands each one to the test.
pub(crate) struct FakeServer {
    addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<FakeConnection>,
}

/// Server side of one accepted socket.
pub(crate) struct FakeConnection {
    pub(crate) authorization: Option<String>,
    pub(crate) uri: String,
    pub(crate) socket_id: String,
    frames: mpsc::UnboundedReceiver<Value>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl FakeServer {
    pub(crate) async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut accepted = 0u32;
            while let Ok((stream, _)) = listener.accept().await {
                accepted += 1;
                let seen = Arc::new(Mutex::new((None, String::new())));
                let record = Arc::clone(&seen);
                let callback =
                    move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        let authorization = req
                            .headers()
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        *record.lock().unwrap() = (authorization, req.uri().to_string());
                        Ok(resp)
                    };
                let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    continue;
                };

                let (authorization, uri) = seen.lock().unwrap().clone();
                let socket_id = format!("{accepted}.{}", 1000 + accepted);
                let (frame_tx, frame_rx) = mpsc::unbounded_channel();
                let (out_tx, out_rx) = mpsc::unbounded_channel();
                tokio::spawn(serve(ws, socket_id.clone(), frame_tx, out_rx));

                let connection = FakeConnection {
                    authorization,
                    uri,
                    socket_id,
                    frames: frame_rx,
                    outgoing: out_tx,
                };
                if tx.send(connection).is_err() {
                    break;
                }
            }
        });

        Self {
            addr,
            connections: rx,
        }
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub(crate) async fn accept(&mut self) -> FakeConnection {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("no client connected")
            .expect("server stopped")
    }

    /// `true` if no client connects within `window`.
    pub(crate) async fn idle_for(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.connections.recv())
            .await
            .is_err()
    }
}

async fn serve(
    mut ws: WebSocketStream<TcpStream>,
    socket_id: String,
    frames: mpsc::UnboundedSender<Value>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    let established = json!({
        "event": "pusher:connection_established",
        "data": json!({ "socket_id": socket_id, "activity_timeout": 30 }).to_string(),
    });
    if ws
        .send(WsMessage::Text(established.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            frame = ws.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Ok(value) = serde_json::from_str::<Value>(&text) {
                        let _ = frames.send(value);
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            out = outgoing.recv() => match out {
                Some(Outgoing::Frame(text)) => {
                    if ws.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = ws.close(None).await;
                    break;
                }
            },
        }
    }
}

impl FakeConnection {
    pub(crate) fn send(&self, frame: Value) {
        let _ = self.outgoing.send(Outgoing::Frame(frame.to_string()));
    }

    /// Close the socket from the server side.
    pub(crate) fn close(&self) {
        let _ = self.outgoing.send(Outgoing::Close);
    }

    /// Broadcast a `SendUpdate` event with string-encoded data, as Reverb does.
    pub(crate) fn send_update(&self, channel: &str, payload: Value) {
        self.send(json!({
            "event": "App\\Events\\SendUpdate",
            "channel": channel,
            "data": payload.to_string(),
        }));
    }

    pub(crate) fn subscription_succeeded(&self, channel: &str, user_id: &str) {
        let presence = json!({
            "presence": {
                "ids": [user_id],
                "hash": { user_id: { "name": "Asha" } },
                "count": 1
            }
        });
        self.send(json!({
            "event": "pusher_internal:subscription_succeeded",
            "channel": channel,
            "data": presence.to_string(),
        }));
    }

    /// Next frame from the client, skipping client pings.
    pub(crate) async fn expect(&mut self, event: &str) -> Value {
        loop {
            let frame = tokio::time::timeout(WAIT, self.frames.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {event}"))
                .unwrap_or_else(|| panic!("socket closed while waiting for {event}"));
            if frame["event"] == "pusher:ping" && event != "pusher:ping" {
                continue;
            }
            assert_eq!(frame["event"], event, "unexpected frame {frame}");
            return frame;
        }
    }

    /// `true` once the client has closed the socket.
    pub(crate) async fn closed(&mut self) -> bool {
        tokio::time::timeout(WAIT, async { while self.frames.recv().await.is_some() {} })
            .await
            .is_ok()
    }
}

/// Signs every channel and records the calls; optionally waits on a gate
/// before answering.
#[derive(Default)]
pub(crate) struct RecordingAuthorizer {
    calls: Mutex<Vec<(String, String)>>,
    gate: Option<Arc<Notify>>,
}

impl RecordingAuthorizer {
    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self {
            calls: Mutex::default(),
            gate: Some(gate),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(WAIT, async {
            while self.calls.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("authorizer was not called");
    }
}

#[async_trait]
impl ChannelAuthorizer for RecordingAuthorizer {
    async fn authorize(
        &self,
        socket_id: &str,
        channel_name: &str,
    ) -> Result<AuthorizationGrant, RealtimeError> {
        self.calls
            .lock()
            .unwrap()
            .push((socket_id.to_string(), channel_name.to_string()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(AuthorizationGrant::new(json!({
            "auth": format!("test-key:{channel_name}"),
            "channel_data": "{\"user_id\":\"42\"}"
        })))
    }
}
