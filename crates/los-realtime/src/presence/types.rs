//! Member and subscription types, plus the hook set a caller registers on join.

use std::fmt;

use serde_json::Value;

use crate::protocol::DomainEvent;
use crate::RealtimeError;

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// A member of a presence channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: String,
    /// Whatever the authorization endpoint put in `channel_data.user_info`.
    pub info: Value,
}

impl Member {
    pub fn new(id: impl Into<String>, info: Value) -> Self {
        Self {
            id: id.into(),
            info,
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription State
// ---------------------------------------------------------------------------

/// Where a channel session stands with the broadcast server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Waiting for a socket, an authorization grant or the server's ack.
    Pending,
    Subscribed,
    /// Authorization or subscription failed; retried on the next reconnect.
    Failed,
    /// Released. Terminal.
    Unsubscribed,
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

pub(crate) type Hook<T> = Box<dyn Fn(T) + Send + Sync>;

/// Optional hooks invoked for one presence channel.
///
/// Hooks run on the connection's background task, so they should hand work
/// off (e.g. into a channel) rather than block.
#[derive(Default)]
pub struct PresenceCallbacks {
    pub(crate) here: Option<Hook<Vec<Member>>>,
    pub(crate) joining: Option<Hook<Member>>,
    pub(crate) leaving: Option<Hook<Member>>,
    pub(crate) error: Option<Hook<RealtimeError>>,
    pub(crate) on_update: Option<Hook<DomainEvent>>,
}

impl PresenceCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once the subscription succeeds.
    pub fn here(mut self, f: impl Fn(Vec<Member>) + Send + Sync + 'static) -> Self {
        self.here = Some(Box::new(f));
        self
    }

    pub fn joining(mut self, f: impl Fn(Member) + Send + Sync + 'static) -> Self {
        self.joining = Some(Box::new(f));
        self
    }

    pub fn leaving(mut self, f: impl Fn(Member) + Send + Sync + 'static) -> Self {
        self.leaving = Some(Box::new(f));
        self
    }

    /// Called when authorization, subscription or the transport fails.
    pub fn error(mut self, f: impl Fn(RealtimeError) + Send + Sync + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    /// Called for every domain event delivered on the channel.
    pub fn on_update(mut self, f: impl Fn(DomainEvent) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for PresenceCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceCallbacks")
            .field("here", &self.here.is_some())
            .field("joining", &self.joining.is_some())
            .field("leaving", &self.leaving.is_some())
            .field("error", &self.error.is_some())
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}
