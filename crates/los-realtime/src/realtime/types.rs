//! Configuration, Pusher protocol frames, and the command/state enums shared
//! by the connection handle and its background task.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use crate::presence::SessionShared;
use crate::RealtimeError;

/// Pusher protocol revision spoken by the client.
pub const PROTOCOL_VERSION: u8 = 7;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Transport configuration for a Reverb / Pusher-compatible server.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Public application key.
    pub app_key: String,
    pub host: String,
    pub port: u16,
    /// Path prefix in front of `/app/{key}`, usually empty.
    pub path: String,
    /// Use `wss` instead of `ws`.
    pub force_tls: bool,
    /// Absolute URL of the channel authorization endpoint.
    pub auth_endpoint: String,
    /// Namespace prepended to broadcast event names (`App\Events`).
    pub event_namespace: Option<String>,
    /// Seconds of silence before the client pings the server.
    pub activity_timeout_secs: u64,
    /// Seconds to wait for any frame after a client ping.
    pub pong_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Reconnect base delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            host: "localhost".to_string(),
            port: 443,
            path: String::new(),
            force_tls: true,
            auth_endpoint: "http://localhost:8000/broadcasting/auth".to_string(),
            event_namespace: Some("App\\Events".to_string()),
            activity_timeout_secs: 120,
            pong_timeout_secs: 30,
            connect_timeout_secs: 15,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}

impl RealtimeConfig {
    /// WebSocket URL for the configured application.
    pub fn ws_url(&self) -> String {
        let scheme = if self.force_tls { "wss" } else { "ws" };
        format!(
            "{scheme}://{}:{}{}/app/{}?protocol={PROTOCOL_VERSION}&client=los-realtime&version={}&flash=false",
            self.host,
            self.port,
            self.path.trim_end_matches('/'),
            self.app_key,
            env!("CARGO_PKG_VERSION"),
        )
    }

    /// Event names accepted as domain events: the namespaced form and the
    /// bare one.
    pub(crate) fn event_names(&self, event: &str) -> Vec<String> {
        let formatted = format_event_name(self.event_namespace.as_deref(), event);
        let bare = event.trim_start_matches(['.', '\\']).to_string();
        if formatted == bare {
            vec![bare]
        } else {
            vec![formatted, bare]
        }
    }

    pub(crate) fn activity_timeout(&self) -> Duration {
        Duration::from_secs(self.activity_timeout_secs)
    }

    pub(crate) fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Format a broadcast event name the way Laravel Echo does.
///
/// `SendUpdate` becomes `App\Events\SendUpdate`; a leading `.` or `\` opts
/// out of the namespace.
pub fn format_event_name(namespace: Option<&str>, event: &str) -> String {
    if let Some(bare) = event.strip_prefix('.').or_else(|| event.strip_prefix('\\')) {
        return bare.to_string();
    }
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}\\{event}", ns.trim_end_matches('\\')),
        _ => event.to_string(),
    }
}

/// Build the upgrade request, authenticated with the bearer token.
pub(crate) fn build_request(url: &str, token: &str) -> Result<Request, RealtimeError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| RealtimeError::Transport(format!("invalid socket URL: {e}")))?;
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| RealtimeError::Transport("token is not a valid header value".into()))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

// ---------------------------------------------------------------------------
// Pusher Protocol Types
// ---------------------------------------------------------------------------

/// Pusher event names.
pub(crate) mod pusher {
    pub const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
    pub const ERROR: &str = "pusher:error";
    pub const PING: &str = "pusher:ping";
    pub const PONG: &str = "pusher:pong";
    pub const SUBSCRIBE: &str = "pusher:subscribe";
    pub const UNSUBSCRIBE: &str = "pusher:unsubscribe";
    pub const SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";
    pub const SUBSCRIPTION_SUCCEEDED_PUBLIC: &str = "pusher:subscription_succeeded";
    pub const SUBSCRIPTION_ERROR: &str = "pusher:subscription_error";
    pub const MEMBER_ADDED: &str = "pusher_internal:member_added";
    pub const MEMBER_REMOVED: &str = "pusher_internal:member_removed";
}

/// A Pusher protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PusherMessage {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl PusherMessage {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            channel: None,
            data,
        }
    }

    /// `data`, decoded if the server sent it as a JSON string.
    pub fn data_value(&self) -> Value {
        match &self.data {
            Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| self.data.clone()),
            other => other.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// State & Commands
// ---------------------------------------------------------------------------

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been created yet.
    Uninitialized,
    /// Dialing, or waiting to redial after a failure.
    Connecting,
    /// The server has assigned a socket id.
    Open,
    /// Torn down. Terminal.
    Closed,
}

/// Requests from handles to the background task.
pub(crate) enum Command {
    Subscribe(Arc<SessionShared>),
    Unsubscribe(Arc<SessionShared>),
    Disconnect,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ws_url_follows_scheme_and_path() {
        let config = RealtimeConfig {
            app_key: "abc".into(),
            host: "reverb.example.in".into(),
            port: 443,
            path: "/ws/".into(),
            ..Default::default()
        };
        let url = config.ws_url();
        assert!(url.starts_with("wss://reverb.example.in:443/ws/app/abc?protocol=7&"));
        assert!(url.contains("client=los-realtime"));
        assert!(url.ends_with("&flash=false"));

        let plain = RealtimeConfig {
            force_tls: false,
            port: 8080,
            ..config
        };
        assert!(plain.ws_url().starts_with("ws://reverb.example.in:8080/ws/app/abc?"));
    }

    #[test]
    fn event_names_are_namespaced_like_echo() {
        assert_eq!(
            format_event_name(Some("App\\Events"), "SendUpdate"),
            "App\\Events\\SendUpdate"
        );
        assert_eq!(format_event_name(Some("App\\Events"), ".SendUpdate"), "SendUpdate");
        assert_eq!(format_event_name(None, "SendUpdate"), "SendUpdate");
        assert_eq!(format_event_name(Some(""), "SendUpdate"), "SendUpdate");
    }

    #[test]
    fn accepted_names_include_bare_form() {
        let config = RealtimeConfig::default();
        assert_eq!(
            config.event_names("SendUpdate"),
            vec!["App\\Events\\SendUpdate".to_string(), "SendUpdate".to_string()]
        );

        let no_ns = RealtimeConfig {
            event_namespace: None,
            ..Default::default()
        };
        assert_eq!(no_ns.event_names("SendUpdate"), vec!["SendUpdate".to_string()]);
    }

    #[test]
    fn data_may_be_string_encoded() {
        let msg: PusherMessage = serde_json::from_value(json!({
            "event": "pusher:connection_established",
            "data": "{\"socket_id\":\"1.2\",\"activity_timeout\":30}"
        }))
        .unwrap();
        assert_eq!(msg.data_value()["socket_id"], "1.2");

        let msg = PusherMessage::new("x", json!({ "a": 1 }));
        assert_eq!(msg.data_value()["a"], 1);
    }

    #[test]
    fn outgoing_frames_omit_missing_channel() {
        let text = serde_json::to_string(&PusherMessage::new(pusher::PING, json!({}))).unwrap();
        assert_eq!(text, r#"{"event":"pusher:ping","data":{}}"#);
    }

    #[test]
    fn upgrade_request_carries_bearer_token() {
        let request = build_request("ws://127.0.0.1:6001/app/k?protocol=7", "tok").unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer tok");
    }
}
