//! Configuration for the LOS notifier.
//!
//! TOML file with serde defaults for every section, `LOS_*` environment
//! overrides on top, and validation that reports every problem at once.

pub mod env;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    ApiConfig, LoggingConfig, LosConfig, NotificationConfig, RealtimeSettings,
    CONFIG_SCHEMA_VERSION,
};

use std::path::Path;

use los_common::ConfigError;

/// Load the config, apply environment overrides, and validate the result.
///
/// With `path`, the file must exist. Without it, the platform default path
/// is used and created from the template when missing.
pub fn load_config(path: Option<&Path>) -> Result<LosConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };
    env::apply_env_overrides(&mut config)?;
    validation::validate(&config)?;
    Ok(config)
}
