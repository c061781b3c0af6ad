//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Session start
//!     → routes.rs (fresh private Router from the RouteTable)
//!     → server.rs (middleware: request ID, timeout, tracing)
//!     → request.rs (x-request-id generation)
//!     → axum::serve with graceful shutdown
//! ```

pub mod request;
pub mod routes;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use routes::{RouteTable, StandardRoutes, Vars};
pub use server::DebugServer;
