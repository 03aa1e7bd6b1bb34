//! Configuration schema types.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod api;
mod logging;
mod notifications;
mod realtime;

pub use api::*;
pub use logging::*;
pub use notifications::*;
pub use realtime::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LosConfig {
    pub api: ApiConfig,
    pub realtime: RealtimeSettings,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

impl LosConfig {
    /// Full URL of the channel authorization endpoint.
    ///
    /// Web and mobile deployments differ only in `realtime.auth_path`.
    pub fn auth_endpoint(&self) -> String {
        join_url(&self.api.base_url, &self.realtime.auth_path)
    }
}

/// Join a base URL and a path without doubling or dropping the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
