use std::io::{self, Result as IoResult, Stdout, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::event::Event;
use crate::telemetry::{PlainFormatter, TelemetryFormatter};

/// An output target that consumes full [`Event`] objects.
pub trait EventSink: Sync + Send {
    /// Handle a structured event. The sink decides how to format it.
    fn handle(&mut self, event: &Event) -> IoResult<()>;
}

/// Stdout sink with pluggable formatting.
pub struct StdOutSink<F: TelemetryFormatter = PlainFormatter> {
    handle: Stdout,
    formatter: F,
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self {
            handle: io::stdout(),
            formatter: PlainFormatter::new(),
        }
    }
}

impl<F: TelemetryFormatter> StdOutSink<F> {
    pub fn with_formatter(formatter: F) -> Self {
        Self {
            handle: io::stdout(),
            formatter,
        }
    }
}

impl<F: TelemetryFormatter> EventSink for StdOutSink<F> {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        let rendered = self.formatter.render_event(event).join_lines();
        self.handle.write_all(rendered.as_bytes())?;
        self.handle.flush()
    }
}

/// In-memory sink for tests and snapshots.
///
/// Clones share the same backing buffer, so a handle kept by a test observes
/// everything the bus delivered.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured events so far.
    pub fn snapshot(&self) -> Vec<Event> {
        self.entries.lock().clone()
    }

    /// Captured events whose scope matches `scope`.
    pub fn with_scope(&self, scope: &str) -> Vec<Event> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.scope_label() == scope)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.entries.lock().push(event.clone());
        Ok(())
    }
}

/// Channel-based sink for streaming events to async consumers.
///
/// Events are forwarded to a tokio mpsc channel without blocking, which suits
/// live dashboards and per-run progress views.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    /// Create a sink that forwards every event into `tx`.
    ///
    /// # Example
    /// ```no_run
    /// use tokio::sync::mpsc;
    /// use loomflow::event_bus::{ChannelSink, EventBus};
    ///
    /// let (tx, mut rx) = mpsc::unbounded_channel();
    /// let bus = EventBus::default();
    /// bus.add_sink(ChannelSink::new(tx));
    ///
    /// tokio::spawn(async move {
    ///     while let Some(event) = rx.recv().await {
    ///         println!("{event}");
    ///     }
    /// });
    /// ```
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver dropped"))
    }
}
