//! Realtime notification core for the LOS companion app.
//!
//! Connects to a Laravel Reverb (Pusher protocol 7) server, joins the
//! signed-in user's presence channel and hands domain events to the
//! application through per-session hooks.
//!
//! - [`EchoManager`]: owns the single live [`Connection`].
//! - [`ChannelAuthorizer`]: signs channel subscriptions over HTTP.
//! - [`ChannelSession`]: one joined presence channel.
//! - [`DomainEvent`]: the payload of a `SendUpdate` broadcast.

pub mod authorizer;
pub mod error;
pub mod manager;
pub mod presence;
pub mod protocol;
pub mod realtime;

pub use authorizer::{AuthorizationGrant, ChannelAuthorizer, HttpAuthorizer};
pub use error::RealtimeError;
pub use manager::{AuthorizerFactory, EchoManager};
pub use presence::{ChannelSession, Member, PresenceCallbacks, SubscriptionState};
pub use protocol::{events, DomainEvent, EventKind, MessageField};
pub use realtime::{Connection, ConnectionState, RealtimeConfig};
