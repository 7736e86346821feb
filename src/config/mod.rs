//! Layered configuration.
//!
//! Values come from an optional `config/default.*` file, then from
//! `VIGIL_`-prefixed environment variables (`__` separates sections, e.g.
//! `VIGIL_KEEPALIVE__INTERVAL_MS=15000`). Anything left unset falls back to
//! [`Settings::default`].

mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    ConnectionSettings, EndpointSettings, KeepaliveSettings, LoggingSettings, Settings,
};

/// Loads the configuration from the default file and environment variables
/// and merges it with the default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] but reads the file layer from `path` (extension optional).
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("VIGIL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
