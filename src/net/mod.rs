//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured address (":6666", "localhost:6060", ...)
//!     → listener.rs (normalise, bind)
//!     → Hand off to the HTTP layer for one session
//! ```
//!
//! # Design Decisions
//! - The listener is owned by exactly one session and dropped with it
//! - Bind failures are typed so the session can report them as events

pub mod listener;

pub use listener::{bind, normalize_address, ListenerError};
