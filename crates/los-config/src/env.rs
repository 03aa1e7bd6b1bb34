//! Environment overrides and `.env` loading.
//!
//! Deployments configure the broadcast server the same way the web and
//! mobile builds do: through environment variables that win over the file.

use std::path::Path;

use los_common::ConfigError;
use tracing::debug;

use crate::schema::LosConfig;

pub const ENV_API_BASE_URL: &str = "LOS_API_BASE_URL";
pub const ENV_REVERB_APP_KEY: &str = "LOS_REVERB_APP_KEY";
pub const ENV_REVERB_HOST: &str = "LOS_REVERB_HOST";
pub const ENV_REVERB_PORT: &str = "LOS_REVERB_PORT";
pub const ENV_REVERB_SCHEME: &str = "LOS_REVERB_SCHEME";
pub const ENV_REVERB_AUTH_PATH: &str = "LOS_REVERB_AUTH_PATH";

/// Load `KEY=VALUE` lines from a `.env` file into the process environment.
///
/// Variables already set in the environment are left alone. A missing
/// file is not an error. Returns the number of variables set.
pub fn load_dotenv(path: &Path) -> usize {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return 0;
    };

    let mut loaded = 0;
    for (key, value) in parse_dotenv(&contents) {
        if std::env::var(&key).is_err() {
            std::env::set_var(&key, value);
            loaded += 1;
        }
    }
    debug!(path = %path.display(), loaded, "loaded .env file");
    loaded
}

/// Parse `.env` contents into key/value pairs, skipping blanks and comments.
pub(crate) fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Apply `LOS_*` overrides from the process environment.
pub fn apply_env_overrides(config: &mut LosConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

/// Apply overrides using an arbitrary variable lookup.
pub fn apply_overrides_from<F>(config: &mut LosConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_API_BASE_URL) {
        config.api.base_url = url;
    }
    if let Some(key) = get(ENV_REVERB_APP_KEY) {
        config.realtime.app_key = key;
    }
    if let Some(host) = get(ENV_REVERB_HOST) {
        config.realtime.host = host;
    }
    if let Some(port) = get(ENV_REVERB_PORT) {
        let port = port.trim().parse::<u16>().map_err(|e| {
            ConfigError::ValidationError(format!("{ENV_REVERB_PORT} = {port:?}: {e}"))
        })?;
        config.realtime.port = Some(port);
    }
    if let Some(scheme) = get(ENV_REVERB_SCHEME) {
        config.realtime.scheme = scheme;
    }
    if let Some(path) = get(ENV_REVERB_AUTH_PATH) {
        config.realtime.auth_path = path;
    }
    Ok(())
}
