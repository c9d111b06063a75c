//! Rendering for events and recorded errors, plus tracing bootstrap.
//!
//! Sinks delegate formatting to a [`TelemetryFormatter`] so output style is
//! swappable without touching bus plumbing. [`init_tracing`] wires the
//! crate's `tracing` spans to stderr for embedders that want logs without
//! assembling a subscriber themselves.

use std::io::IsTerminal;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::ErrorEvent;
use crate::event_bus::Event;

pub const CONTEXT_COLOR: &str = "\x1b[32m"; // green
pub const LINE_COLOR: &str = "\x1b[35m"; // magenta
pub const RESET_COLOR: &str = "\x1b[0m";

/// Color mode for formatted output.
///
/// - [`FormatterMode::Auto`]: detects TTY capability via `stderr.is_terminal()`
/// - [`FormatterMode::Colored`]: always include ANSI color codes
/// - [`FormatterMode::Plain`]: never include color codes (logs, files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    #[default]
    Auto,
    Colored,
    Plain,
}

impl FormatterMode {
    /// `Colored` when stderr is a terminal, otherwise `Plain`.
    pub fn auto_detect() -> Self {
        if std::io::stderr().is_terminal() {
            FormatterMode::Colored
        } else {
            FormatterMode::Plain
        }
    }

    pub fn is_colored(&self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// Rendered output for one telemetry item, consumable by sinks.
#[derive(Clone, Debug, Default)]
pub struct EventRender {
    pub context: Option<String>,
    pub lines: Vec<String>,
}

impl EventRender {
    pub fn join_lines(&self) -> String {
        self.lines.join("")
    }
}

pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &Event) -> EventRender;
    fn render_errors(&self, errors: &[ErrorEvent]) -> Vec<EventRender>;
}

/// Plain text formatter with optional ANSI color codes.
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    pub fn new() -> Self {
        Self {
            mode: FormatterMode::Auto,
        }
    }

    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }

    fn color<'a>(&self, ansi_code: &'a str) -> &'a str {
        if self.mode.is_colored() { ansi_code } else { "" }
    }

    fn reset(&self) -> &str {
        if self.mode.is_colored() { RESET_COLOR } else { "" }
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &Event) -> EventRender {
        let line = if self.mode.is_colored() {
            format!("{LINE_COLOR}{event}{RESET_COLOR}\n")
        } else {
            format!("{event}\n")
        };
        EventRender {
            context: Some(event.scope_label().to_string()),
            lines: vec![line],
        }
    }

    fn render_errors(&self, errors: &[ErrorEvent]) -> Vec<EventRender> {
        errors
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut lines = Vec::new();
                lines.push(format!(
                    "[{i}] {} | {}{:?}{}\n",
                    e.when,
                    self.color(CONTEXT_COLOR),
                    e.scope,
                    self.reset()
                ));
                lines.push(format!(
                    "{}  error: {}{}\n",
                    self.color(LINE_COLOR),
                    e.message,
                    self.reset()
                ));
                if !e.context.is_null() {
                    lines.push(format!(
                        "{}  context: {}{}\n",
                        self.color(LINE_COLOR),
                        e.context,
                        self.reset()
                    ));
                }
                EventRender {
                    context: Some(format!("{:?}", e.scope)),
                    lines,
                }
            })
            .collect()
    }
}

/// Install a stderr `tracing` subscriber with env-filter support.
///
/// The filter honors `RUST_LOG` and falls back to `error,loomflow=info`.
/// Safe to call more than once; later calls are no-ops, which keeps test
/// binaries that share a process happy.
pub fn init_tracing() {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("error,loomflow=info"))
        .unwrap_or_default();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init();
}
