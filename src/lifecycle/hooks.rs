//! Session hooks.
//!
//! A [`Hook`] is called right after the arming signal was received, before
//! the debug endpoint binds, and again after the endpoint has shut down (or
//! failed to start). Hooks run synchronously on the session task in the
//! order they were registered, so a slow hook delays the session.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::observability::events::{Event, EventKind, EventSink};

/// Integrator callbacks around one debug endpoint session.
///
/// Implementations holding mutable state must synchronize it themselves.
pub trait Hook: Send + Sync {
    /// Runs after the signal was received, before the endpoint starts.
    fn pre_start(&self);

    /// Runs after the endpoint shut down, or after it failed to start.
    fn post_shutdown(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreStart,
    PostShutdown,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::PreStart => "pre_start",
            Phase::PostShutdown => "post_shutdown",
        }
    }
}

/// Ordered, read-only list of hooks.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookChain {
    pub fn new(hooks: Vec<Arc<dyn Hook>>) -> Self {
        Self { hooks }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn pre_start(&self, events: &dyn EventSink) {
        self.run(Phase::PreStart, events);
    }

    pub fn post_shutdown(&self, events: &dyn EventSink) {
        self.run(Phase::PostShutdown, events);
    }

    /// A panicking hook is reported and skipped; the rest of the chain still runs.
    fn run(&self, phase: Phase, events: &dyn EventSink) {
        for (index, hook) in self.hooks.iter().enumerate() {
            let result = catch_unwind(AssertUnwindSafe(|| match phase {
                Phase::PreStart => hook.pre_start(),
                Phase::PostShutdown => hook.post_shutdown(),
            }));

            if let Err(panic) = result {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                events.event(&Event {
                    kind: EventKind::Error,
                    message: "hook panicked",
                    attrs: &[
                        ("phase", phase.as_str().to_string()),
                        ("index", index.to_string()),
                        ("err", reason),
                    ],
                });
            }
        }
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
