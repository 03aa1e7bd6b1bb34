//! Sign-in endpoints.

use std::fmt;

use los_common::User;
use reqwest::Method;
use serde::Deserialize;

use crate::{ApiClient, ApiError};

/// Successful login: a bearer token plus the signed-in user.
#[derive(Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

impl ApiClient {
    /// Exchange credentials for a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.send_json(self.request(Method::POST, "/auth/login").json(&body))
            .await
    }

    /// Revoke the current token on the server.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.send_json::<serde_json::Value>(self.request(Method::POST, "/auth/logout"))
            .await
            .map(|_| ())
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.send_json(self.request(Method::GET, "/auth/user")).await
    }
}
