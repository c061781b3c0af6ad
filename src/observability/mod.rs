//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Controller and sessions produce:
//!     → events.rs (lifecycle events to the configured EventSink)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → TracingSink → tracing subscriber set up by logging.rs
//!     → Prometheus exporter (binary, optional)
//! ```

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{Event, EventKind, EventSink, TracingSink};
