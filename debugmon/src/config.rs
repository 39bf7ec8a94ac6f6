//! Monitor and dashboard configuration.
//!
//! Configuration is plain serde data. A dashboard can be described in JSON
//! and loaded with [`DashboardConfig::load`]:
//!
//! ```json
//! {
//!   "monitors": [
//!     { "name": "requests", "display_name": "Requests", "icon": "globe-alt" },
//!     { "name": "logs", "icon": "document-text", "max_records": 500 }
//!   ]
//! }
//! ```
//!
//! Every field except `name` is optional. Zero values for `max_records` and
//! `channel_buffer_size` are corrected to their defaults when the store is
//! built rather than rejected.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RegistryError, Result};
use crate::event::DEFAULT_SUBSCRIBER_BUFFER;
use crate::monitor::Icon;
use crate::store::{DEFAULT_CAPACITY, StoreOptions};

fn default_max_records() -> usize {
    DEFAULT_CAPACITY
}

fn default_channel_buffer_size() -> usize {
    DEFAULT_SUBSCRIBER_BUFFER
}

/// Configuration for a single monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Unique name among all monitors of a manager.
    pub name: String,

    /// Name shown in the dashboard; empty means "use `name`".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    /// Navigation icon.
    #[serde(default)]
    pub icon: Icon,

    /// Maximum number of entries retained by the monitor's store.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// Queue length of each live subscriber.
    #[serde(default = "default_channel_buffer_size")]
    pub channel_buffer_size: usize,
}

impl MonitorConfig {
    /// Creates a config with default capacity, buffer and icon.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            icon: Icon::default(),
            max_records: DEFAULT_CAPACITY,
            channel_buffer_size: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the icon.
    #[must_use]
    pub fn with_icon(mut self, icon: Icon) -> Self {
        self.icon = icon;
        self
    }

    /// Sets the store capacity.
    #[must_use]
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    /// Sets the per-subscriber queue length.
    #[must_use]
    pub fn with_channel_buffer_size(mut self, channel_buffer_size: usize) -> Self {
        self.channel_buffer_size = channel_buffer_size;
        self
    }

    /// Returns the display name, falling back to the monitor name.
    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Returns the options for this monitor's store.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            capacity: self.max_records,
            subscriber_buffer: self.channel_buffer_size,
        }
    }

    /// Validates the monitor name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] if the name is empty or
    /// surrounded by whitespace.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::InvalidName {
                reason: "monitor name must not be empty".to_string(),
            }
            .into());
        }
        if self.name.trim() != self.name {
            return Err(RegistryError::InvalidName {
                reason: format!("monitor name '{}' has surrounding whitespace", self.name),
            }
            .into());
        }
        Ok(())
    }
}

/// A set of monitors to register at application setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Monitors in display order.
    #[serde(default)]
    pub monitors: Vec<MonitorConfig>,
}

impl DashboardConfig {
    /// Reads a dashboard configuration from a JSON file.
    ///
    /// The result is not validated; see [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not a valid dashboard document.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(config)
    }

    /// Checks every monitor name and rejects duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] or
    /// [`RegistryError::DuplicateMonitor`] for the first offending monitor.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.monitors.len());
        for monitor in &self.monitors {
            monitor.validate()?;
            if !seen.insert(monitor.name.as_str()) {
                return Err(RegistryError::DuplicateMonitor {
                    name: monitor.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}
