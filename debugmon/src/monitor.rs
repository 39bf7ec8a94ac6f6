//! Monitors: named dashboards backed by one store each.
//!
//! A [`Monitor`] combines display metadata from its [`MonitorConfig`] with a
//! private [`Store`] of JSON payloads. Monitors are created by
//! [`Manager::add_monitor`](crate::manager::Manager::add_monitor) and live
//! as long as the manager; they are never removed, only cleared.
//!
//! Producers call [`Monitor::add`] with any `Serialize` payload (or
//! [`Monitor::write`] with a ready-made JSON value); the delivery surface
//! reads back with [`Monitor::latest`], [`Monitor::since`] or a live
//! subscription.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::MonitorConfig;
use crate::error::{PayloadError, Result};
use crate::event::{Cleared, Subscription};
use crate::id::EntryId;
use crate::store::{Entry, Store};

/// An entry as stored by a monitor.
pub type MonitorEntry = Entry<Value>;

/// Icon shown next to a monitor in the dashboard navigation.
///
/// Built-in icons serialize as their kebab-case name; anything else is
/// treated as custom markup and carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Icon {
    /// Exclamation mark in a circle, used for error monitors.
    ExclamationCircle,
    /// Stacked discs, used for query and writer monitors.
    #[default]
    CircleStack,
    /// Text document, used for log monitors.
    DocumentText,
    /// Globe, used for request monitors.
    GlobeAlt,
    /// Caller-supplied icon markup.
    Custom(String),
}

impl Icon {
    /// Returns the serialized name (or the custom markup).
    pub fn as_str(&self) -> &str {
        match self {
            Self::ExclamationCircle => "exclamation-circle",
            Self::CircleStack => "circle-stack",
            Self::DocumentText => "document-text",
            Self::GlobeAlt => "globe-alt",
            Self::Custom(markup) => markup,
        }
    }
}

impl From<String> for Icon {
    fn from(name: String) -> Self {
        match name.as_str() {
            "exclamation-circle" => Self::ExclamationCircle,
            "circle-stack" => Self::CircleStack,
            "document-text" => Self::DocumentText,
            "globe-alt" => Self::GlobeAlt,
            _ => Self::Custom(name),
        }
    }
}

impl From<Icon> for String {
    fn from(icon: Icon) -> Self {
        match icon {
            Icon::Custom(markup) => markup,
            builtin => builtin.as_str().to_string(),
        }
    }
}

/// A named, independently bounded event store with display metadata.
#[derive(Debug)]
pub struct Monitor {
    config: MonitorConfig,
    store: Store<Value>,
}

impl Monitor {
    /// Builds a monitor and its store from a validated config.
    pub(crate) fn new(config: MonitorConfig) -> Self {
        let store = Store::with_options(config.store_options());
        Self { config, store }
    }

    /// Returns the unique monitor name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the human-readable name, falling back to [`name`](Self::name).
    pub fn display_name(&self) -> &str {
        self.config.display_name()
    }

    /// Returns the navigation icon.
    pub fn icon(&self) -> &Icon {
        &self.config.icon
    }

    /// Returns the configuration this monitor was built from.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Store<Value> {
        &self.store
    }

    /// Serializes `payload` to JSON and stores it.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Encode`] if the payload cannot be represented
    /// as JSON, or an id error from the store. Nothing is stored on error.
    pub fn add<T: Serialize + ?Sized>(&self, payload: &T) -> Result<EntryId> {
        let value = serde_json::to_value(payload).map_err(PayloadError::Encode)?;
        self.write(value)
    }

    /// Stores an already-built JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an id error if the store cannot assign an id.
    pub fn write(&self, payload: Value) -> Result<EntryId> {
        let id = self.store.add(payload)?;
        tracing::trace!(monitor = %self.config.name, %id, "monitor entry recorded");
        Ok(id)
    }

    /// Returns up to `n` of the newest entries, newest first.
    pub fn latest(&self, n: usize) -> Vec<Arc<MonitorEntry>> {
        self.store.latest(n)
    }

    /// Returns every retained entry after `cursor`, oldest first.
    pub fn since(&self, cursor: EntryId) -> Vec<Arc<MonitorEntry>> {
        self.store.since(cursor)
    }

    /// Looks up a retained entry by id.
    pub fn get(&self, id: EntryId) -> Option<Arc<MonitorEntry>> {
        self.store.get(id)
    }

    /// Returns the number of retained entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns whether the monitor holds no entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Removes every entry; returns how many were removed.
    pub fn clear(&self) -> usize {
        self.store.clear()
    }

    /// Subscribes to entries as they are added.
    pub fn subscribe_add(&self) -> Subscription<Arc<MonitorEntry>> {
        self.store.subscribe_add()
    }

    /// Subscribes to clear signals.
    pub fn subscribe_clear(&self) -> Subscription<Cleared> {
        self.store.subscribe_clear()
    }
}
