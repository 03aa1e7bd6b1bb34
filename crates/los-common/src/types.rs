//! Backend records shared by the REST client, the realtime core and the app.
//!
//! Only the fields this workspace reads are typed; everything else the
//! backend sends is preserved in `extra` so records survive a round trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::{MessageId, QueryId, UserId};

/// Status value the backend uses for a closed query thread.
pub const STATUS_CLOSED: &str = "CLOSED";

/// An authenticated user, as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A query thread between loan participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryThread {
    pub id: QueryId,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryThread {
    pub fn is_closed(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_CLOSED)
    }
}

/// A single message inside a query thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<QueryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThreadMessage {
    /// Overlay every field present in `patch` onto `self`.
    pub fn merge(&mut self, patch: ThreadMessage) {
        if patch.id.is_some() {
            self.id = patch.id;
        }
        if patch.query_id.is_some() {
            self.query_id = patch.query_id;
        }
        if patch.message.is_some() {
            self.message = patch.message;
        }
        if patch.sender_id.is_some() {
            self.sender_id = patch.sender_id;
        }
        if patch.sender_name.is_some() {
            self.sender_name = patch.sender_name;
        }
        if patch.created_at.is_some() {
            self.created_at = patch.created_at;
        }
        self.extra.extend(patch.extra);
    }
}

/// Per-status counters for one side of the query dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCounts {
    pub pending: u32,
    pub reverted: u32,
    pub closed: u32,
}

/// Dashboard counters for queries raised by and to the current user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryCounts {
    pub raised_by_you: StatusCounts,
    pub raised_to_you: StatusCounts,
}
