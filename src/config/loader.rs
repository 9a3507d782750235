//! Configuration Loader
//!
//! Builds a [`WorkOrderConfig`] from defaults, an optional TOML file and
//! `WORKORDER__`-prefixed environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::WorkOrderConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_CONFIG_PATH: &str = "config/workorder.toml";
const ENV_PREFIX: &str = "WORKORDER";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env_source: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `config/workorder.toml` (if present) and the process environment
    pub fn load() -> ConfigResult<WorkOrderConfig> {
        Self::new().build()
    }

    /// Read this file instead of the default location; it must exist
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use these variables instead of the process environment
    #[must_use]
    pub fn with_env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    pub fn build(self) -> ConfigResult<WorkOrderConfig> {
        let mut builder = Config::builder();

        match &self.path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigurationError::ConfigFileNotFound { path: path.clone() });
                }
                debug!(path = %path.display(), "Loading configuration file");
                builder = builder.add_source(File::from(path.as_path()).required(true));
            }
            None => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_PATH).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(self.env_source),
        );

        let config: WorkOrderConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            max_connections = config.database.max_connections,
            channel_capacity = config.events.channel_capacity,
            max_note_length = config.lifecycle.max_note_length,
            "Configuration loaded"
        );
        Ok(config)
    }
}
