//! Thin Pusher-protocol client for Laravel Reverb.
//!
//! Provides the socket transport under the presence sessions: handshake with
//! a bearer token, channel subscribe/unsubscribe with out-of-band
//! authorization, ping/pong liveness, and auto-reconnect with backoff.

mod client;
mod connection;
mod handler;
mod types;

#[cfg(test)]
pub(crate) mod fake_server;
#[cfg(test)]
mod tests;

pub use client::Connection;
pub(crate) use types::Command;
pub use types::{format_event_name, ConnectionState, PusherMessage, RealtimeConfig, PROTOCOL_VERSION};
