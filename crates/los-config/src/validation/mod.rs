//! Full configuration validation.
//!
//! Collects every range and format problem into a single `ConfigError`.

mod helpers;


use crate::schema::LosConfig;
use los_common::ConfigError;

use helpers::{validate_http_url, validate_range};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &LosConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    // API
    validate_http_url(&mut errors, "api.base_url", &config.api.base_url);
    validate_range(&mut errors, "api.timeout_secs", config.api.timeout_secs, 1, 300);

    // Realtime
    let rt = &config.realtime;
    if rt.host.trim().is_empty() {
        errors.push("realtime.host must not be empty".into());
    }
    if rt.port == Some(0) {
        errors.push("realtime.port must not be 0".into());
    }
    if !matches!(rt.scheme.to_ascii_lowercase().as_str(), "http" | "https") {
        errors.push(format!(
            "realtime.scheme = {:?} must be \"http\" or \"https\"",
            rt.scheme
        ));
    }
    if !rt.auth_path.starts_with('/') {
        errors.push(format!(
            "realtime.auth_path = {:?} must start with '/'",
            rt.auth_path
        ));
    }
    validate_range(
        &mut errors,
        "realtime.activity_timeout_secs",
        rt.activity_timeout_secs,
        5,
        600,
    );
    validate_range(&mut errors, "realtime.pong_timeout_secs", rt.pong_timeout_secs, 1, 120);
    validate_range(
        &mut errors,
        "realtime.connect_timeout_secs",
        rt.connect_timeout_secs,
        1,
        120,
    );
    if rt.reconnect_delay_secs == 0 || rt.reconnect_delay_secs > rt.max_reconnect_delay_secs {
        errors.push(format!(
            "realtime.reconnect_delay_secs = {} must be in [1, max_reconnect_delay_secs = {}]",
            rt.reconnect_delay_secs, rt.max_reconnect_delay_secs
        ));
    }

    // Notifications
    validate_range(
        &mut errors,
        "notifications.toast_capacity",
        config.notifications.toast_capacity,
        1,
        256,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
