//! # Configuration
//!
//! Layered configuration for the lifecycle core, resolved in order:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`config/workorder.toml` if present, or an explicit path)
//! 3. Environment variables prefixed `WORKORDER__`, with `__` between levels
//!
//! ```toml
//! [database]
//! url = "postgresql://localhost/workorder_production"
//! max_connections = 20
//!
//! [lifecycle]
//! max_note_length = 500
//!
//! [lifecycle.sub_state_mapping]
//! cancelled = "request_received"
//! ```
//!
//! `WORKORDER__DATABASE__MAX_CONNECTIONS=5` overrides the pool size.

pub mod error;
pub mod loader;

use crate::constants::system::{
    DEFAULT_ACQUIRE_TIMEOUT_SECONDS, DEFAULT_DATABASE_URL, DEFAULT_EVENT_CHANNEL_CAPACITY,
    DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_NOTE_LENGTH, MAX_EVENT_CHANNEL_CAPACITY,
};
use crate::state_machine::SubStateMapper;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkOrderConfig {
    pub database: DatabaseConfig,
    pub events: EventsConfig,
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_seconds: DEFAULT_ACQUIRE_TIMEOUT_SECONDS,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Longest accepted transition reason or note, in characters
    pub max_note_length: usize,
    /// Primary state name to sub-state label; entries override the defaults
    pub sub_state_mapping: HashMap<String, String>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_note_length: DEFAULT_MAX_NOTE_LENGTH,
            sub_state_mapping: HashMap::new(),
        }
    }
}

impl WorkOrderConfig {
    /// Reject values that would make the pipeline unusable
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "database.url",
                &self.database.url,
                "must not be empty",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                0,
                "must be greater than zero",
            ));
        }
        if self.database.acquire_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.acquire_timeout_seconds",
                0,
                "must be greater than zero",
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                0,
                "must be greater than zero",
            ));
        }
        if self.events.channel_capacity > MAX_EVENT_CHANNEL_CAPACITY {
            return Err(ConfigurationError::invalid_value(
                "events.channel_capacity",
                self.events.channel_capacity,
                format!("must be at most {MAX_EVENT_CHANNEL_CAPACITY}"),
            ));
        }
        if self.lifecycle.max_note_length == 0 {
            return Err(ConfigurationError::invalid_value(
                "lifecycle.max_note_length",
                0,
                "must be greater than zero",
            ));
        }

        SubStateMapper::from_labels(
            self.lifecycle
                .sub_state_mapping
                .iter()
                .map(|(state, label)| (state.as_str(), label.as_str())),
        )
        .map_err(|e| {
            ConfigurationError::invalid_value(
                "lifecycle.sub_state_mapping",
                format!("{:?}", self.lifecycle.sub_state_mapping),
                e.to_string(),
            )
        })?;

        Ok(())
    }
}
