//! REST API configuration.

use serde::{Deserialize, Serialize};

/// Where the backend REST API lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Scheme and host of the backend, e.g. `https://los.example.com`.
    pub base_url: String,
    /// Path prefix in front of every REST endpoint.
    pub prefix: String,
    /// Request timeout in seconds (valid range: 1-300).
    pub timeout_secs: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            prefix: "/api/mobile".into(),
            timeout_secs: 30,
        }
    }
}
