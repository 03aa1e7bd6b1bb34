//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# LOS notifier configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.
# LOS_API_BASE_URL and LOS_REVERB_* environment variables override this file.

[api]
# base_url = "http://localhost:8000"
# prefix = "/api/mobile"
# timeout_secs = 30         # 1-300

[realtime]
# app_key = ""
# host = "localhost"
# port = 443                # defaults to 443 for https, 80 otherwise
# path = ""
# scheme = "https"
# auth_path = "/broadcasting/auth"    # web; mobile backends use "/api/broadcasting/auth"
# event_namespace = "App\\Events"
# activity_timeout_secs = 120         # 5-600
# pong_timeout_secs = 30              # 1-120
# connect_timeout_secs = 15
# reconnect_delay_secs = 1
# max_reconnect_delay_secs = 30

[notifications]
# sound_enabled = true
# sound_file = ""           # empty rings the terminal bell
# toast_capacity = 16       # 1-256

[logging]
# level = "los=info"
"##
    .to_string()
}
