//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Profiler::start (controller.rs):
//!     CAS Idle → Running → spawn watch loop
//!
//! Watch loop (controller.rs + signals.rs):
//!     subscribe → wait {signal, cancellation} → unsubscribe
//!
//! Session (session.rs):
//!     pre_start hooks (hooks.rs) → bind → serve → {timeout, cancellation}
//!     → graceful shutdown → post_shutdown hooks
//! ```
//!
//! # Design Decisions
//! - The run state is a single atomic, only changed by compare-and-swap
//! - The signal is unsubscribed while a session runs, so sessions never nest
//! - Shutdown has timeout: forced close after the deadline

pub mod controller;
pub mod hooks;
pub mod session;
pub mod signals;

pub use controller::{Profiler, ProfilerBuilder, RunState};
pub use hooks::{Hook, HookChain};
pub use session::EndpointError;
pub use signals::{SignalParseError, SignalWatcher, TriggerSignal};
