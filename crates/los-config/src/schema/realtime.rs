//! Broadcast server (Reverb) settings.

use serde::{Deserialize, Serialize};

/// Connection settings for the realtime broadcast server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub app_key: String,
    pub host: String,
    /// Explicit port. Defaults to 443 for `https` and 80 otherwise.
    pub port: Option<u16>,
    /// Path prefix in front of `/app/{key}` on the socket URL.
    pub path: String,
    /// `https` selects TLS (`wss`), anything else plain `ws`.
    pub scheme: String,
    /// Authorization endpoint path, appended to `api.base_url`.
    pub auth_path: String,
    /// Namespace prefixed to listened event names (`App\Events`).
    pub event_namespace: String,
    /// Client-side inactivity window before pinging (valid range: 5-600).
    pub activity_timeout_secs: u64,
    /// How long to wait for a pong (valid range: 1-120).
    pub pong_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
    pub max_reconnect_delay_secs: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            host: "localhost".into(),
            port: None,
            path: String::new(),
            scheme: "https".into(),
            auth_path: "/broadcasting/auth".into(),
            event_namespace: "App\\Events".into(),
            activity_timeout_secs: 120,
            pong_timeout_secs: 30,
            connect_timeout_secs: 15,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}

impl RealtimeSettings {
    pub fn force_tls(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }

    /// The configured port, or the scheme's default.
    pub fn effective_port(&self) -> u16 {
        self.port
            .unwrap_or(if self.force_tls() { 443 } else { 80 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_follows_scheme_when_unset() {
        let mut settings = RealtimeSettings::default();
        assert_eq!(settings.effective_port(), 443);
        settings.scheme = "http".into();
        assert_eq!(settings.effective_port(), 80);
        settings.port = Some(8080);
        assert_eq!(settings.effective_port(), 8080);
    }
}
