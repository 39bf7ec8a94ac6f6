//! The monitor registry.
//!
//! A [`Manager`] owns every [`Monitor`] of a process. Monitors are added once
//! at application setup and enumerated in registration order by the view
//! layer. There is no removal.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{DashboardConfig, MonitorConfig};
use crate::error::{RegistryError, Result};
use crate::monitor::Monitor;

#[derive(Debug, Default)]
struct Registry {
    /// Registration order.
    monitors: Vec<Arc<Monitor>>,
    by_name: HashMap<String, Arc<Monitor>>,
}

/// Addition-only registry of named monitors.
///
/// # Example
///
/// ```rust
/// use debugmon::{Manager, MonitorConfig};
///
/// # fn main() -> debugmon::Result<()> {
/// let manager = Manager::new();
/// let requests = manager.add_monitor(MonitorConfig::new("requests").with_max_records(100))?;
///
/// requests.add(&serde_json::json!({"method": "GET", "uri": "/"}))?;
///
/// assert_eq!(manager.monitor("requests").unwrap().len(), 1);
/// assert!(manager.add_monitor(MonitorConfig::new("requests")).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Manager {
    registry: RwLock<Registry>,
}

impl Manager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with every monitor of a dashboard config registered.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if the config has an invalid or
    /// duplicate name. No monitor is registered in that case.
    pub fn from_config(config: DashboardConfig) -> Result<Self> {
        config.validate()?;
        let manager = Self::new();
        for monitor in config.monitors {
            manager.add_monitor(monitor)?;
        }
        Ok(manager)
    }

    /// Builds a monitor from `config`, registers it and returns it.
    ///
    /// The monitor's store is sized from `config.max_records`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidName`] for an unusable name and
    /// [`RegistryError::DuplicateMonitor`] if the name is already taken.
    pub fn add_monitor(&self, config: MonitorConfig) -> Result<Arc<Monitor>> {
        config.validate()?;

        let mut registry = self.registry.write();
        if registry.by_name.contains_key(&config.name) {
            return Err(RegistryError::DuplicateMonitor { name: config.name }.into());
        }

        let monitor = Arc::new(Monitor::new(config));
        registry
            .by_name
            .insert(monitor.name().to_string(), Arc::clone(&monitor));
        registry.monitors.push(Arc::clone(&monitor));

        tracing::debug!(
            monitor = monitor.name(),
            capacity = monitor.store().capacity(),
            "monitor registered"
        );
        Ok(monitor)
    }

    /// Looks up a monitor by name.
    pub fn monitor(&self, name: &str) -> Option<Arc<Monitor>> {
        self.registry.read().by_name.get(name).cloned()
    }

    /// Returns all monitors in registration order.
    pub fn monitors(&self) -> Vec<Arc<Monitor>> {
        self.registry.read().monitors.clone()
    }

    /// Returns the first registered monitor, the dashboard's landing page.
    pub fn first(&self) -> Option<Arc<Monitor>> {
        self.registry.read().monitors.first().cloned()
    }

    /// Returns the number of registered monitors.
    pub fn len(&self) -> usize {
        self.registry.read().monitors.len()
    }

    /// Returns whether no monitor is registered.
    pub fn is_empty(&self) -> bool {
        self.registry.read().monitors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DebugMonitorError;

    #[test]
    fn test_registration_order_preserved() {
        let manager = Manager::new();
        for name in ["requests", "logs", "queries"] {
            manager.add_monitor(MonitorConfig::new(name)).unwrap();
        }

        let names: Vec<_> = manager
            .monitors()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, ["requests", "logs", "queries"]);
        assert_eq!(manager.first().unwrap().name(), "requests");
        assert_eq!(manager.len(), 3);
    }

    #[test]
    fn test_lookup_returns_same_monitor() {
        let manager = Manager::new();
        let added = manager.add_monitor(MonitorConfig::new("logs")).unwrap();

        let found = manager.monitor("logs").unwrap();
        assert!(Arc::ptr_eq(&added, &found));
        assert!(manager.monitor("missing").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected_without_side_effects() {
        let manager = Manager::new();
        let original = manager
            .add_monitor(MonitorConfig::new("logs").with_max_records(5))
            .unwrap();

        let result = manager.add_monitor(MonitorConfig::new("logs").with_max_records(50));
        assert!(matches!(
            result,
            Err(DebugMonitorError::Registry(RegistryError::DuplicateMonitor { .. }))
        ));

        assert_eq!(manager.len(), 1);
        let found = manager.monitor("logs").unwrap();
        assert!(Arc::ptr_eq(&original, &found));
        assert_eq!(found.store().capacity(), 5);
    }

    #[test]
    fn test_monitors_have_independent_stores() {
        let manager = Manager::new();
        let a = manager.add_monitor(MonitorConfig::new("a")).unwrap();
        let b = manager.add_monitor(MonitorConfig::new("b")).unwrap();

        a.add(&1).unwrap();
        a.add(&2).unwrap();
        b.add(&3).unwrap();
        a.clear();

        assert_eq!(a.len(), 0);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_from_config_rejects_duplicates_up_front() {
        let config = DashboardConfig {
            monitors: vec![MonitorConfig::new("x"), MonitorConfig::new("x")],
        };
        assert!(Manager::from_config(config).is_err());
    }

    #[test]
    fn test_empty_manager() {
        let manager = Manager::new();
        assert!(manager.is_empty());
        assert!(manager.first().is_none());
        assert!(manager.monitors().is_empty());
    }
}
