//! The `config` module loads the relay's settings.
//!
//! Sources are layered: built-in defaults, then an optional TOML file, then
//! `CONVO__SECTION__KEY` environment variables (a `.env` file is honored).

mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, LogSettings, ServerSettings, Settings};

const DEFAULT_CONFIG_FILE: &str = "config/default";
const ENV_PREFIX: &str = "CONVO";

/// Loads the configuration from `path` (or `config/default` when `None`)
/// and environment variables, merged over default values.
pub fn load_config(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge(Settings::default()))
}

#[cfg(test)]
mod tests;
