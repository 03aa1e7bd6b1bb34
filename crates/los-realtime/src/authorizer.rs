//! Out-of-band authorization of private and presence channel subscriptions.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::RealtimeError;

/// Signed payload returned by the authorization endpoint.
///
/// Opaque to the client: its fields (`auth`, `channel_data`, ...) are merged
/// verbatim into the subscribe frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationGrant(Value);

impl AuthorizationGrant {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// `data` of a `pusher:subscribe` frame for `channel`.
    pub(crate) fn subscribe_data(&self, channel: &str) -> Value {
        let mut data = match &self.0 {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        data.insert("channel".to_string(), Value::String(channel.to_string()));
        Value::Object(data)
    }
}

/// Exchanges a socket id and channel name for an [`AuthorizationGrant`].
///
/// Called by the connection for every subscription attempt, including the
/// re-subscriptions that follow a reconnect.
#[async_trait]
pub trait ChannelAuthorizer: Send + Sync {
    async fn authorize(
        &self,
        socket_id: &str,
        channel_name: &str,
    ) -> Result<AuthorizationGrant, RealtimeError>;
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    socket_id: &'a str,
    channel_name: &'a str,
}

/// Authorizes against the backend's broadcasting endpoint with a bearer token.
///
/// No request timeout is set: a hung endpoint leaves the channel pending.
#[derive(Clone)]
pub struct HttpAuthorizer {
    endpoint: String,
    token: String,
    http: reqwest::Client,
}

impl HttpAuthorizer {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for HttpAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAuthorizer")
            .field("endpoint", &self.endpoint)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl ChannelAuthorizer for HttpAuthorizer {
    async fn authorize(
        &self,
        socket_id: &str,
        channel_name: &str,
    ) -> Result<AuthorizationGrant, RealtimeError> {
        debug!(channel = %channel_name, socket_id = %socket_id, "Authorizing channel");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .json(&AuthRequest {
                socket_id,
                channel_name,
            })
            .send()
            .await
            .map_err(|e| RealtimeError::Transport(format!("authorization request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RealtimeError::Authorization {
                status: status.as_u16(),
                body,
            });
        }

        let value = response
            .json::<Value>()
            .await
            .map_err(|e| RealtimeError::Protocol(format!("invalid authorization response: {e}")))?;
        Ok(AuthorizationGrant::new(value))
    }
}
