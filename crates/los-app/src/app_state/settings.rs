//! Builds runtime objects from the loaded configuration.

use std::sync::Arc;

use los_config::{LosConfig, NotificationConfig};
use los_platform::{FilePlayer, MutedPlayer, SoundPlayer, TerminalBell};
use los_realtime::RealtimeConfig;

/// Transport configuration for the realtime core.
pub fn realtime_config(config: &LosConfig) -> RealtimeConfig {
    let rt = &config.realtime;
    RealtimeConfig {
        app_key: rt.app_key.clone(),
        host: rt.host.clone(),
        port: rt.effective_port(),
        path: rt.path.clone(),
        force_tls: rt.force_tls(),
        auth_endpoint: config.auth_endpoint(),
        event_namespace: Some(rt.event_namespace.clone()).filter(|ns| !ns.is_empty()),
        activity_timeout_secs: rt.activity_timeout_secs,
        pong_timeout_secs: rt.pong_timeout_secs,
        connect_timeout_secs: rt.connect_timeout_secs,
        reconnect_delay_secs: rt.reconnect_delay_secs,
        max_reconnect_delay_secs: rt.max_reconnect_delay_secs,
    }
}

/// The notification sound: a file when configured, else the terminal bell.
pub fn sound_player(config: &NotificationConfig) -> Arc<dyn SoundPlayer> {
    if !config.sound_enabled {
        Arc::new(MutedPlayer)
    } else if config.sound_file.trim().is_empty() {
        Arc::new(TerminalBell)
    } else {
        Arc::new(FilePlayer::new(config.sound_file.trim()))
    }
}
