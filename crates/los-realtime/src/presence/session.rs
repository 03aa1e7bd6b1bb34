//! Per-channel state shared between a caller's handle and the connection task.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use super::types::{Hook, Member, PresenceCallbacks, SubscriptionState};
use crate::protocol::DomainEvent;
use crate::realtime::Command;
use crate::RealtimeError;

/// Prefix the broadcast server expects on presence channel names.
pub(crate) const PRESENCE_PREFIX: &str = "presence-";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Shared State
// ---------------------------------------------------------------------------

/// State of one joined channel, owned jointly by [`ChannelSession`] and the
/// connection loop.
///
/// Hooks are cloned out under the lock and invoked after it is released, so a
/// hook may safely call back into the session (e.g. to unsubscribe).
pub(crate) struct SessionShared {
    name: String,
    wire_name: String,
    state: Mutex<SubscriptionState>,
    hooks: Mutex<Option<Arc<PresenceCallbacks>>>,
}

impl SessionShared {
    pub(crate) fn new(name: String, callbacks: PresenceCallbacks) -> Self {
        Self {
            wire_name: format!("{PRESENCE_PREFIX}{name}"),
            name,
            state: Mutex::new(SubscriptionState::Pending),
            hooks: Mutex::new(Some(Arc::new(callbacks))),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn wire_name(&self) -> &str {
        &self.wire_name
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        *lock(&self.state)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state() != SubscriptionState::Unsubscribed
    }

    /// Drop all hooks and mark the session terminal.
    ///
    /// Returns `true` only for the call that actually released it.
    pub(crate) fn release(&self) -> bool {
        let mut state = lock(&self.state);
        if *state == SubscriptionState::Unsubscribed {
            return false;
        }
        *state = SubscriptionState::Unsubscribed;
        lock(&self.hooks).take();
        true
    }

    /// Back to `Pending` for a fresh authorization round.
    pub(crate) fn reset_pending(&self) {
        let mut state = lock(&self.state);
        if *state != SubscriptionState::Unsubscribed {
            *state = SubscriptionState::Pending;
        }
    }

    fn hooks(&self) -> Option<Arc<PresenceCallbacks>> {
        if !self.is_active() {
            return None;
        }
        lock(&self.hooks).clone()
    }

    /// Run the hook `pick` selects, unless the session was released while it
    /// was being looked up.
    fn invoke<T>(&self, pick: impl FnOnce(&PresenceCallbacks) -> Option<&Hook<T>>, arg: T) {
        let Some(hooks) = self.hooks() else { return };
        if let Some(f) = pick(&*hooks) {
            if self.is_active() {
                f(arg);
            }
        }
    }

    pub(crate) fn subscribed(&self, members: Vec<Member>) {
        {
            let mut state = lock(&self.state);
            if *state == SubscriptionState::Unsubscribed {
                return;
            }
            *state = SubscriptionState::Subscribed;
        }
        debug!(channel = %self.name, members = members.len(), "Subscribed");
        self.invoke(|h| h.here.as_ref(), members);
    }

    pub(crate) fn member_added(&self, member: Member) {
        self.invoke(|h| h.joining.as_ref(), member);
    }

    pub(crate) fn member_removed(&self, member: Member) {
        self.invoke(|h| h.leaving.as_ref(), member);
    }

    pub(crate) fn deliver(&self, event: DomainEvent) {
        self.invoke(|h| h.on_update.as_ref(), event);
    }

    /// Mark the session failed and report `err`, once per failure episode.
    ///
    /// A session that is already `Failed` stays silent until it has been
    /// reset by a new connection.
    pub(crate) fn fail(&self, err: RealtimeError) {
        {
            let mut state = lock(&self.state);
            match *state {
                SubscriptionState::Unsubscribed | SubscriptionState::Failed => return,
                _ => *state = SubscriptionState::Failed,
            }
        }
        debug!(channel = %self.name, error = %err, "Channel failed");
        self.invoke(|h| h.error.as_ref(), err);
    }
}

// ---------------------------------------------------------------------------
// Public Handle
// ---------------------------------------------------------------------------

/// A joined presence channel.
///
/// Dropping the handle unsubscribes, so keep it alive for as long as
/// notifications should flow.
pub struct ChannelSession {
    shared: Arc<SessionShared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl ChannelSession {
    pub(crate) fn new(shared: Arc<SessionShared>, commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { shared, commands }
    }

    /// Channel name as the application knows it, e.g. `user.42`.
    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// Channel name on the wire, e.g. `presence-user.42`.
    pub fn wire_name(&self) -> &str {
        self.shared.wire_name()
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.state()
    }

    /// Leave the channel and drop every hook.
    ///
    /// No hook starts once this returns. A hook that was already running on
    /// the connection task may still finish. Safe to call repeatedly, from
    /// inside a hook, and after the connection is gone.
    pub fn unsubscribe(&self) {
        if !self.shared.release() {
            return;
        }
        debug!(channel = %self.shared.name(), "Unsubscribing");
        // The connection may already be closed; nothing to leave then.
        let _ = self
            .commands
            .send(Command::Unsubscribe(Arc::clone(&self.shared)));
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSession")
            .field("name", &self.shared.name())
            .field("state", &self.shared.state())
            .finish()
    }
}
