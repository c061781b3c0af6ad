//! Signal-armed debug endpoint.
//!
//! A [`Profiler`] waits for an OS signal, then serves introspection routes
//! over HTTP for a bounded time before shutting the endpoint down again.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ProfilerConfig;
pub use http::routes::{RouteTable, StandardRoutes};
pub use lifecycle::{Hook, Profiler, ProfilerBuilder, TriggerSignal};
pub use observability::events::{Event, EventKind, EventSink};
