//! Client for the loan-origination backend REST API.
//!
//! Covers the auth and query/message endpoints the notifier needs. Every
//! request carries the bearer token once one is attached.

mod auth;
mod client;
mod queries;

pub use auth::LoginResponse;
pub use client::ApiClient;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP 401. The token is no longer valid and the user must sign in again.
    #[error("unauthorized")]
    Unauthorized,
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
}
