//! Application-level payloads delivered on a user's presence channel.
//!
//! The transport envelope (Pusher protocol) lives in `realtime`; this module
//! only knows what a `SendUpdate` broadcast carries.
//!
//! The backend overloads the `message` field: most broadcasts carry a plain
//! string, but new-message broadcasts may carry the full message record
//! instead. [`MessageField`] keeps the two shapes apart rather than guessing
//! which one a consumer meant.

use los_common::{QueryId, ThreadMessage};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::RealtimeError;

/// Event names and type tags used by the backend.
pub mod events {
    /// The only broadcast event the client listens for.
    pub const SEND_UPDATE: &str = "SendUpdate";
    pub const QUERY_MESSAGE: &str = "QUERY_MESSAGE";
    pub const QUERY_MESSAGE_CLOSED: &str = "QUERY_MESSAGE_CLOSED";
}

/// The `type` tag of a domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A message was posted to a query thread.
    QueryMessage,
    /// A query thread was closed.
    QueryMessageClosed,
    /// Any other notification.
    Other(String),
}

impl Default for EventKind {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        match tag {
            events::QUERY_MESSAGE => Self::QueryMessage,
            events::QUERY_MESSAGE_CLOSED => Self::QueryMessageClosed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(tag.as_deref().map(Self::from).unwrap_or_default())
    }
}

/// The two shapes the `message` field arrives in.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageField {
    /// Human-readable notification text.
    Text(String),
    /// A full thread message record.
    Record(ThreadMessage),
}

/// A domain event received on a presence channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DomainEvent {
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    #[serde(default, deserialize_with = "deserialize_message")]
    pub message: Option<MessageField>,
    #[serde(default)]
    pub query_id: Option<QueryId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DomainEvent {
    pub fn from_value(value: Value) -> Result<Self, RealtimeError> {
        serde_json::from_value(value)
            .map_err(|e| RealtimeError::Protocol(format!("invalid domain event: {e}")))
    }

    /// Notification text, when `message` is a string.
    pub fn text(&self) -> Option<&str> {
        match &self.message {
            Some(MessageField::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Embedded message record, when `message` is an object.
    pub fn record(&self) -> Option<&ThreadMessage> {
        match &self.message {
            Some(MessageField::Record(record)) => Some(record),
            _ => None,
        }
    }

    /// Thread this event refers to: `query_id`, else the record's own.
    pub fn thread_id(&self) -> Option<&QueryId> {
        self.query_id
            .as_ref()
            .or_else(|| self.record().and_then(|r| r.query_id.as_ref()))
    }
}

/// Strings become `Text` (empty ones count as absent), objects become
/// `Record`, anything else is dropped.
fn deserialize_message<'de, D>(deserializer: D) -> Result<Option<MessageField>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(text)) if !text.is_empty() => Some(MessageField::Text(text)),
        Some(value @ Value::Object(_)) => serde_json::from_value(value)
            .ok()
            .map(MessageField::Record),
        _ => None,
    })
}
