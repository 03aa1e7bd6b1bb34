//! Presence channel sessions: member tracking, hooks and release.

mod session;
mod types;

pub use session::ChannelSession;
pub(crate) use session::SessionShared;
pub use types::{Member, PresenceCallbacks, SubscriptionState};
