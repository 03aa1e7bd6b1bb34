//! Incoming Pusher frame routing.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::types::{pusher, PusherMessage};
use crate::presence::{Member, SessionShared};
use crate::protocol::DomainEvent;
use crate::RealtimeError;

/// What the connection loop has to do after a frame was routed.
#[derive(Debug, PartialEq)]
pub(crate) enum HandlerAction {
    None,
    Established {
        socket_id: String,
        activity_timeout: Option<u64>,
    },
    /// The server pinged; answer with a pong.
    Ping,
    ServerError {
        code: Option<u16>,
        message: String,
    },
}

/// Route one frame. Channel frames go straight to the matching session's
/// hooks; connection-level frames are returned to the caller.
pub(crate) fn handle_message(
    msg: &PusherMessage,
    channels: &HashMap<String, Arc<SessionShared>>,
    event_names: &[String],
) -> HandlerAction {
    match msg.event.as_str() {
        pusher::CONNECTION_ESTABLISHED => {
            let data = msg.data_value();
            match data.get("socket_id").and_then(Value::as_str) {
                Some(socket_id) => HandlerAction::Established {
                    socket_id: socket_id.to_string(),
                    activity_timeout: data.get("activity_timeout").and_then(Value::as_u64),
                },
                None => {
                    warn!("connection_established without socket_id");
                    HandlerAction::None
                }
            }
        }
        pusher::PING => HandlerAction::Ping,
        pusher::PONG => HandlerAction::None,
        pusher::ERROR => {
            let data = msg.data_value();
            HandlerAction::ServerError {
                code: data
                    .get("code")
                    .and_then(Value::as_u64)
                    .and_then(|c| u16::try_from(c).ok()),
                message: data
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }
        }
        _ => {
            route_channel_message(msg, channels, event_names);
            HandlerAction::None
        }
    }
}

fn route_channel_message(
    msg: &PusherMessage,
    channels: &HashMap<String, Arc<SessionShared>>,
    event_names: &[String],
) {
    let Some(channel) = msg.channel.as_deref() else {
        debug!(event = %msg.event, "Ignoring frame without channel");
        return;
    };
    let Some(session) = channels.get(channel) else {
        debug!(channel = %channel, event = %msg.event, "Frame for unknown channel");
        return;
    };

    match msg.event.as_str() {
        pusher::SUBSCRIPTION_SUCCEEDED | pusher::SUBSCRIPTION_SUCCEEDED_PUBLIC => {
            session.subscribed(parse_members(&msg.data_value()));
        }
        pusher::SUBSCRIPTION_ERROR => {
            let data = msg.data_value();
            let status = data
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok());
            let message = data
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| data.to_string());
            warn!(channel = %channel, ?status, error = %message, "Subscription rejected");
            session.fail(RealtimeError::Subscription { status, message });
        }
        pusher::MEMBER_ADDED => {
            if let Some(member) = parse_member(&msg.data_value()) {
                session.member_added(member);
            }
        }
        pusher::MEMBER_REMOVED => {
            if let Some(member) = parse_member(&msg.data_value()) {
                session.member_removed(member);
            }
        }
        event if event_names.iter().any(|name| name == event) => {
            match DomainEvent::from_value(msg.data_value()) {
                Ok(domain_event) => session.deliver(domain_event),
                Err(e) => warn!(channel = %channel, error = %e, "Dropping malformed event"),
            }
        }
        other => debug!(channel = %channel, event = %other, "Ignoring event"),
    }
}

/// Ids arrive as strings or numbers depending on the backend's user model.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_member(data: &Value) -> Option<Member> {
    let id = data.get("user_id").and_then(id_string)?;
    let info = data.get("user_info").cloned().unwrap_or(Value::Null);
    Some(Member::new(id, info))
}

/// Members from a `subscription_succeeded` payload, in `ids` order when given.
fn parse_members(data: &Value) -> Vec<Member> {
    let Some(presence) = data.get("presence") else {
        return Vec::new();
    };
    let hash = presence.get("hash").and_then(Value::as_object);
    let info_for = |id: &str| {
        hash.and_then(|h| h.get(id))
            .cloned()
            .unwrap_or(Value::Null)
    };

    match presence.get("ids").and_then(Value::as_array) {
        Some(ids) => ids
            .iter()
            .filter_map(id_string)
            .map(|id| {
                let info = info_for(&id);
                Member::new(id, info)
            })
            .collect(),
        None => hash
            .map(|h| {
                h.iter()
                    .map(|(id, info)| Member::new(id.clone(), info.clone()))
                    .collect()
            })
            .unwrap_or_default(),
    }
}
