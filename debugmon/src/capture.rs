//! Producers that feed application output into monitors.
//!
//! - [`TeeWriter`] duplicates raw writer output (a logger sink, stdout) into
//!   a monitor.
//! - [`LogLayer`] (feature `tracing-layer`) records `tracing` events.
//!
//! Capture must never break the host: monitor failures are logged and
//! swallowed, and the wrapped writer's own result is what callers see.

use std::io;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::monitor::Monitor;

/// Payload recorded for each chunk written through a [`TeeWriter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterPayload {
    /// The written bytes, lossily decoded as UTF-8.
    pub data: String,
}

/// A writer that forwards to an inner writer and records what was written.
#[derive(Debug)]
pub struct TeeWriter<W> {
    inner: W,
    monitor: Arc<Monitor>,
}

impl<W: io::Write> TeeWriter<W> {
    /// Wraps `inner`, recording into `monitor`.
    pub fn new(inner: W, monitor: Arc<Monitor>) -> Self {
        Self { inner, monitor }
    }

    /// Returns a reference to the wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwraps the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> io::Write for TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        if written > 0 {
            let payload = WriterPayload {
                data: String::from_utf8_lossy(&buf[..written]).into_owned(),
            };
            if let Err(e) = self.monitor.add(&payload) {
                tracing::debug!(monitor = self.monitor.name(), "writer capture failed: {e}");
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Payload recorded for each captured log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPayload {
    /// Severity, e.g. `INFO`.
    pub level: String,
    /// Event target, usually the emitting module path.
    pub target: String,
    /// The formatted `message` field.
    pub message: String,
    /// Remaining event fields, debug-formatted.
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub fields: std::collections::BTreeMap<String, String>,
    /// Capture time in Unix milliseconds.
    pub timestamp_ms: u64,
}

#[cfg_attr(not(feature = "tracing-layer"), allow(dead_code))]
#[allow(clippy::cast_possible_truncation)] // u64 milliseconds cover ~584 million years
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

#[cfg(feature = "tracing-layer")]
pub use layer::LogLayer;

#[cfg(feature = "tracing-layer")]
mod layer {
    use std::collections::BTreeMap;
    use std::fmt;
    use std::sync::Arc;

    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};

    use super::{LogPayload, unix_millis};
    use crate::monitor::Monitor;

    /// A `tracing` layer that records events into a monitor.
    ///
    /// Events from this crate's modules (`debugmon::*` targets) are never
    /// recorded, so the store's own diagnostics cannot loop back into it.
    /// A host whose own crate is also named `debugmon` is still captured.
    ///
    /// ```rust
    /// use debugmon::{Manager, MonitorConfig};
    /// use debugmon::capture::LogLayer;
    /// use tracing_subscriber::prelude::*;
    ///
    /// # fn main() -> debugmon::Result<()> {
    /// let manager = Manager::new();
    /// let logs = manager.add_monitor(MonitorConfig::new("logs"))?;
    ///
    /// let subscriber = tracing_subscriber::registry().with(LogLayer::new(logs.clone()));
    /// tracing::subscriber::with_default(subscriber, || {
    ///     tracing::info!(user = "ada", "signed in");
    /// });
    ///
    /// assert_eq!(logs.latest(1)[0].payload()["message"], "signed in");
    /// # Ok(())
    /// # }
    /// ```
    #[derive(Debug)]
    pub struct LogLayer {
        monitor: Arc<Monitor>,
        max_level: Level,
    }

    impl LogLayer {
        /// Records every event (up to `TRACE`) into `monitor`.
        pub fn new(monitor: Arc<Monitor>) -> Self {
            Self {
                monitor,
                max_level: Level::TRACE,
            }
        }

        /// Only records events at `max_level` or more severe.
        #[must_use]
        pub fn with_max_level(mut self, max_level: Level) -> Self {
            self.max_level = max_level;
            self
        }
    }

    /// Every event the library emits comes from a submodule.
    fn is_own_target(target: &str) -> bool {
        target.starts_with("debugmon::")
    }

    #[derive(Default)]
    struct FieldVisitor {
        message: String,
        fields: BTreeMap<String, String>,
    }

    impl Visit for FieldVisitor {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "message" {
                self.message = value.to_string();
            } else {
                self.fields.insert(field.name().to_string(), value.to_string());
            }
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.message = format!("{value:?}");
            } else {
                self.fields.insert(field.name().to_string(), format!("{value:?}"));
            }
        }
    }

    impl<S: Subscriber> Layer<S> for LogLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let metadata = event.metadata();
            // More verbose levels compare greater.
            if *metadata.level() > self.max_level || is_own_target(metadata.target()) {
                return;
            }

            let mut visitor = FieldVisitor::default();
            event.record(&mut visitor);

            let payload = LogPayload {
                level: metadata.level().to_string(),
                target: metadata.target().to_string(),
                message: visitor.message,
                fields: visitor.fields,
                timestamp_ms: unix_millis(),
            };
            if let Err(e) = self.monitor.add(&payload) {
                tracing::debug!(monitor = self.monitor.name(), "log capture failed: {e}");
            }
        }
    }

}
