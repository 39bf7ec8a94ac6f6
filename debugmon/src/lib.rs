//! # debugmon
//!
//! Embedded event store and live fan-out for in-process debugging dashboards.
//!
//! debugmon captures application events (HTTP requests, log lines, database
//! queries, errors, raw writer output) into bounded in-memory buffers that a
//! dashboard can page through or follow live. The crate knows nothing about
//! HTTP or rendering; a transport layer sits on top and calls the operations
//! below.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Bounded memory: each store keeps at most `capacity` entries, oldest evicted first
//! - Strictly increasing ids, usable directly as pagination cursors
//! - Producers never block on consumers: slow subscribers miss notifications
//! - No background threads, no I/O, no global state
//!
//! ## Quick Start
//!
//! ```rust
//! use debugmon::{EntryId, Manager, MonitorConfig};
//!
//! # fn main() -> debugmon::Result<()> {
//! let manager = Manager::new();
//! let requests = manager.add_monitor(MonitorConfig::new("requests").with_max_records(500))?;
//!
//! // Producer side (e.g. HTTP middleware)
//! let mut live = requests.subscribe_add();
//! let id = requests.add(&serde_json::json!({"method": "GET", "uri": "/", "status": 200}))?;
//!
//! // Push consumer
//! assert_eq!(live.try_recv().unwrap().id(), id);
//!
//! // Polling consumer
//! let mut cursor = EntryId::ZERO;
//! for entry in requests.since(cursor) {
//!     cursor = entry.id();
//! }
//! assert_eq!(cursor, id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Manager`]: Owns all monitors of a process, in registration order
//! - [`Monitor`]: Named store of JSON payloads plus display metadata
//! - [`Store`]: Bounded, ordered, concurrent entry buffer
//! - [`Subscription`]: Live feed of added entries or clear signals
//!
//! ## Modules
//!
//! - [`id`]: Entry ids and generators
//! - [`store`]: The bounded store
//! - [`event`]: Notification fan-out
//! - [`monitor`]: Monitors and icons
//! - [`manager`]: The monitor registry
//! - [`config`]: Monitor and dashboard configuration
//! - [`capture`]: Writer and `tracing` capture shims
//! - [`error`]: Error types

pub mod capture;
pub mod config;
pub mod error;
pub mod event;
pub mod id;
pub mod manager;
pub mod monitor;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use config::{DashboardConfig, MonitorConfig};
pub use error::{DebugMonitorError, Result};
pub use event::{Cleared, Subscription};
pub use id::{EntryId, IdGenerator, SequenceGenerator, SnowflakeGenerator};
pub use manager::Manager;
pub use monitor::{Icon, Monitor, MonitorEntry};
pub use store::{Entry, Store, StoreOptions};
