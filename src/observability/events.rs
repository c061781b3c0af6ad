//! Structured lifecycle events.
//!
//! The controller and its sessions report everything they do as an
//! [`Event`] handed to an [`EventSink`]. Sinks are called synchronously on
//! the control path and must return promptly.

use std::fmt;

/// Severity of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Debug,
    Info,
    Error,
}

/// A single lifecycle event: kind, message and key/value attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<'a> {
    pub kind: EventKind,
    pub message: &'a str,
    pub attrs: &'a [(&'static str, String)],
}

impl Event<'_> {
    /// Look up an attribute by key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Renders the attributes as `key=value` pairs separated by spaces.
    pub fn fields(&self) -> Fields<'_> {
        Fields(self.attrs)
    }
}

pub struct Fields<'a>(&'a [(&'static str, String)]);

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Receives lifecycle events.
pub trait EventSink: Send + Sync {
    fn event(&self, event: &Event<'_>);
}

impl<F> EventSink for F
where
    F: Fn(&Event<'_>) + Send + Sync,
{
    fn event(&self, event: &Event<'_>) {
        self(event)
    }
}

/// Default sink: forwards events to `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn event(&self, event: &Event<'_>) {
        let fields = event.fields();
        match event.kind {
            EventKind::Debug => {
                tracing::debug!(target: "signal_profiler", %fields, "{}", event.message)
            }
            EventKind::Info => {
                tracing::info!(target: "signal_profiler", %fields, "{}", event.message)
            }
            EventKind::Error => {
                tracing::error!(target: "signal_profiler", %fields, "{}", event.message)
            }
        }
    }
}
