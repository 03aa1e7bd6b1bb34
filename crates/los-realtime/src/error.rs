/// Failures of the realtime core.
///
/// Only `NotInitialized` is ever returned directly to a caller. Everything
/// else reaches the application through a session's `error` hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    #[error("realtime connection is not initialized; call initialize first")]
    NotInitialized,

    /// The authorization endpoint answered with a non-2xx status.
    #[error("channel authorization failed with HTTP {status}: {body}")]
    Authorization { status: u16, body: String },

    /// No HTTP response, or the socket itself failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The broadcast server rejected a subscription.
    #[error("subscription rejected (status {status:?}): {message}")]
    Subscription { status: Option<u16>, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RealtimeError {
    /// HTTP-like status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authorization { status, .. } => Some(*status),
            Self::Subscription { status, .. } => *status,
            _ => None,
        }
    }
}
