//! Error types for the debugmon event store.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all debugmon operations.
///
/// Most read-side conditions (unknown id, evicted cursor, slow subscriber)
/// are not errors at all and are reported as empty results or `None`. What
/// remains here are the failures a producer or the setup code must see.
#[derive(Error, Debug)]
pub enum DebugMonitorError {
    /// Error while generating an entry id (the entry was not stored).
    #[error("id generation error: {0}")]
    Id(#[from] IdError),

    /// Error while registering a monitor.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Error while converting a payload into its stored form.
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// Error while loading or validating configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur while generating entry ids.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The wall clock reads earlier than the generator's custom epoch.
    #[error("system clock ({now_ms} ms) is before the id epoch ({epoch_ms} ms)")]
    ClockBeforeEpoch {
        /// Current wall-clock time in Unix milliseconds.
        now_ms: i64,
        /// The generator epoch in Unix milliseconds.
        epoch_ms: i64,
    },
}

/// Errors that can occur when registering monitors with a manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A monitor with this name is already registered.
    #[error("monitor '{name}' is already registered")]
    DuplicateMonitor {
        /// The conflicting name.
        name: String,
    },

    /// The monitor name is not usable as a registry key.
    #[error("invalid monitor name: {reason}")]
    InvalidName {
        /// Why the name was rejected.
        reason: String,
    },
}

/// Errors that can occur when a payload is converted for storage.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// The payload could not be encoded as a JSON value.
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors that can occur while loading a dashboard configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for a dashboard.
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for `Result<T, DebugMonitorError>`.
pub type Result<T> = std::result::Result<T, DebugMonitorError>;
